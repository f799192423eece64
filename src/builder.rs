/*
 * BookReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

//! Offline construction of the feature matrix and the metadata table from raw ratings.

use std::time::Instant;

use fnv::{FnvHashMap, FnvHashSet};
use tracing::info;

use crate::error::{Error, Result};
use crate::metadata::{MetadataTable, StoredMetadata};
use crate::stats::DataDictionary;
use crate::types::{self, ItemFeatureMatrix};
use crate::utils;

/// A single explicit or implicit rating of a book (identified by ISBN) by a user.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    pub user_id: String,
    pub isbn: String,
    pub rating: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookRow {
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<String>,
    pub publisher: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreRow {
    pub isbn: String,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderSettings {
    /// Users need strictly more ratings than this to be retained.
    pub user_rated_threshold: u32,
    /// Titles need at least this many ratings from retained users.
    pub books_rated_threshold: u32,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        BuilderSettings { user_rated_threshold: 150, books_rated_threshold: 30 }
    }
}

pub struct BuiltArtifacts {
    pub matrix: ItemFeatureMatrix,
    pub metadata: MetadataTable,
}

struct JoinedRating<'a> {
    user_id: &'a str,
    isbn: &'a str,
    rating: f32,
    book: &'a BookRow,
}

pub fn build(
    ratings: &[RatingRow],
    books: &[BookRow],
    genres: &[GenreRow],
    settings: &BuilderSettings,
) -> Result<BuiltArtifacts> {

    let build_start = Instant::now();

    let rating_dict = DataDictionary::from_interactions(
        ratings.iter().map(|rating| (rating.user_id.as_str(), rating.isbn.as_str())));

    info!(
        num_ratings = rating_dict.num_interactions(),
        num_users = rating_dict.num_users(),
        num_books = rating_dict.num_items(),
        "read raw ratings");

    let mut books_by_isbn: FnvHashMap<&str, &BookRow> =
        FnvHashMap::with_capacity_and_hasher(books.len(), Default::default());
    for book in books {
        books_by_isbn.entry(book.isbn.as_str()).or_insert(book);
    }

    let mut genre_by_isbn: FnvHashMap<&str, Option<&str>> =
        FnvHashMap::with_capacity_and_hasher(genres.len(), Default::default());
    for genre in genres {
        genre_by_isbn.entry(genre.isbn.as_str()).or_insert(genre.genre.as_deref());
    }

    let joined: Vec<JoinedRating> = ratings.iter()
        .filter(|rating| rating_dict.user_count(&rating.user_id) > settings.user_rated_threshold)
        .filter_map(|rating| {
            books_by_isbn.get(rating.isbn.as_str()).map(|book| {
                JoinedRating {
                    user_id: &rating.user_id,
                    isbn: &rating.isbn,
                    rating: rating.rating,
                    book,
                }
            })
        })
        .collect();

    let title_dict = DataDictionary::from_interactions(
        joined.iter().map(|joined| (joined.user_id, joined.book.title.as_str())));

    let popular: Vec<&JoinedRating> = joined.iter()
        .filter(|joined| title_dict.item_count(&joined.book.title) >= settings.books_rated_threshold)
        .collect();

    info!(
        active_user_ratings = joined.len(),
        popular_title_ratings = popular.len(),
        "applied popularity filters");

    if popular.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no ratings survive the popularity filters (users > {} ratings, titles >= {} ratings)",
            settings.user_rated_threshold, settings.books_rated_threshold)));
    }

    let weighted_ratings = weighted_ratings(&popular, &title_dict);

    // A user counts once per ISBN, the first rating wins
    let mut seen: FnvHashSet<(&str, &str)> = FnvHashSet::default();
    let deduplicated: Vec<&JoinedRating> = popular.iter()
        .filter(|joined| seen.insert((joined.user_id, joined.isbn)))
        .cloned()
        .collect();

    let matrix = pivot(&deduplicated)?;

    let mut metadata = MetadataTable::new();
    for joined in &deduplicated {
        let book = joined.book;
        if metadata.get(&book.title).is_some() {
            continue;
        }

        metadata.insert(StoredMetadata {
            title: book.title.clone(),
            author: book.author.clone(),
            year: book.year.clone(),
            genre: genre_by_isbn.get(joined.isbn).cloned().and_then(|genre| genre.map(str::to_owned)),
            image_url: book.image_url.clone(),
            avg_rating: weighted_ratings.get(joined.isbn).cloned(),
            num_ratings: Some(title_dict.item_count(&book.title)),
        });
    }

    info!(
        num_titles = matrix.num_rows(),
        num_users = matrix.num_columns(),
        duration_ms = utils::to_millis(build_start.elapsed()),
        "built feature matrix");

    Ok(BuiltArtifacts { matrix, metadata })
}

/// Weighted rating per ISBN, `v/(v+m) * R + m/(v+m) * C`, where `R` is the plain mean rating of
/// the ISBN, `v` the number of ratings of its title, `C` the mean of `R` over all ratings and `m`
/// the median of `v` over all ratings. Rounded to two decimals.
fn weighted_ratings<'a>(
    popular: &[&JoinedRating<'a>],
    title_dict: &DataDictionary,
) -> FnvHashMap<&'a str, f64> {

    let mut sums: FnvHashMap<&str, (f64, u32)> = FnvHashMap::default();
    for joined in popular {
        let entry = sums.entry(joined.isbn).or_insert((0.0, 0));
        entry.0 += joined.rating as f64;
        entry.1 += 1;
    }

    let mean_ratings: FnvHashMap<&str, f64> = sums.into_iter()
        .map(|(isbn, (sum, count))| (isbn, round_to(sum / count as f64, 3)))
        .collect();

    let overall_mean = popular.iter()
        .map(|joined| mean_ratings[joined.isbn])
        .sum::<f64>() / popular.len() as f64;

    let mut counts: Vec<f64> = popular.iter()
        .map(|joined| title_dict.item_count(&joined.book.title) as f64)
        .collect();
    let median_count = median(&mut counts);

    popular.iter()
        .map(|joined| {
            let v = title_dict.item_count(&joined.book.title) as f64;
            let r = mean_ratings[joined.isbn];
            let weighted = (v / (v + median_count)) * r + (median_count / (v + median_count)) * overall_mean;
            (joined.isbn, round_to(weighted, 2))
        })
        .collect()
}

/// Titles become rows in ascending order, users become columns ordered by
/// `stats::cmp_identifiers`. Several ratings of a user for the same title (different ISBNs)
/// are averaged.
fn pivot(ratings: &[&JoinedRating]) -> Result<ItemFeatureMatrix> {

    let dict = DataDictionary::from_interactions(
        ratings.iter().map(|joined| (joined.user_id, joined.book.title.as_str())));

    let users = dict.sorted_users();
    let mut titles: Vec<&str> = ratings.iter().map(|joined| joined.book.title.as_str()).collect();
    titles.sort();
    titles.dedup();

    let column_of: FnvHashMap<&str, usize> = users.iter()
        .enumerate()
        .map(|(column, user)| (*user, column))
        .collect();

    let mut cells: FnvHashMap<(&str, usize), (f64, u32)> = FnvHashMap::default();
    for joined in ratings {
        let cell = cells
            .entry((joined.book.title.as_str(), column_of[joined.user_id]))
            .or_insert((0.0, 0));
        cell.0 += joined.rating as f64;
        cell.1 += 1;
    }

    let mut matrix = ItemFeatureMatrix::new(users.iter().map(|user| user.to_string()).collect());
    for title in titles {
        let mut row = types::new_dense_vector(users.len());
        for (column, value) in row.iter_mut().enumerate() {
            if let Some((sum, count)) = cells.get(&(title, column)) {
                *value = (sum / *count as f64) as f32;
            }
        }
        matrix.push_row(title.to_owned(), &row)?;
    }

    Ok(matrix)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Median with linear interpolation between the two middle values.
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(::std::cmp::Ordering::Equal));

    let position = (values.len() - 1) as f64 * 0.5;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;

    values[lower] + (values[upper] - values[lower]) * (position - lower as f64)
}
