/**
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

use std::fs::{self, File};
use std::io::prelude::*;
use std::io::{stdout, BufReader, BufWriter};
use std::path::Path;

use tracing::{info, warn};

use crate::builder::{BookRow, GenreRow, RatingRow};
use crate::error::{Error, Result};
use crate::metadata::{MetadataTable, StoredMetadata};
use crate::neighbors::IndexManifest;
use crate::recommend::RecommendationResult;
use crate::types::{self, ItemFeatureMatrix};

pub const FEATURE_MATRIX_FILE: &str = "feature_matrix.csv";
pub const METADATA_FILE: &str = "metadata.csv";
pub const NEIGHBOR_INDEX_FILE: &str = "neighbor_index.json";

fn require(artifact: &'static str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::ArtifactMissing { artifact, path: Some(path.to_path_buf()) })
    }
}

/// The feature matrix is stored with a header `title,<user ids...>` and one row per title.
pub fn read_feature_matrix(path: &Path) -> Result<ItemFeatureMatrix> {

    require("feature matrix", path)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let columns: Vec<String> = reader.headers()?
        .iter()
        .skip(1)
        .map(str::to_owned)
        .collect();

    let mut matrix = ItemFeatureMatrix::new(columns);
    let mut row = types::new_dense_vector(matrix.num_columns());

    for (line, record) in reader.records().enumerate() {
        let record = record?;

        let title = record.get(0).ok_or_else(|| {
            Error::InvalidArtifact(format!("feature matrix row {} is empty", line + 1))
        })?;

        if record.len() != matrix.num_columns() + 1 {
            return Err(Error::InvalidArtifact(format!(
                "feature matrix row for '{}' has {} values, expected {}",
                title, record.len() - 1, matrix.num_columns())));
        }

        for (value, cell) in row.iter_mut().zip(record.iter().skip(1)) {
            let cell = cell.trim();
            *value = if cell.is_empty() {
                0.0
            } else {
                cell.parse().map_err(|_| Error::InvalidArtifact(format!(
                    "feature matrix row for '{}' holds a non-numeric value '{}'", title, cell)))?
            };
        }

        matrix.push_row(title.to_owned(), &row)?;
    }

    Ok(matrix)
}

pub fn write_feature_matrix(matrix: &ItemFeatureMatrix, path: &Path) -> Result<()> {

    let mut writer = csv::Writer::from_path(path)?;

    let header = ::std::iter::once("title").chain(matrix.columns().iter().map(String::as_str));
    writer.write_record(header)?;

    for (row_index, title) in matrix.titles().iter().enumerate() {
        let values = matrix.row(row_index).iter().map(|value| value.to_string());
        writer.write_record(::std::iter::once(title.clone()).chain(values))?;
    }

    writer.flush()?;
    Ok(())
}

/// The metadata table is stored with a header naming the fields of `StoredMetadata`, empty cells
/// denote absent values.
pub fn read_metadata(path: &Path) -> Result<MetadataTable> {

    require("metadata table", path)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let mut table = MetadataTable::new();
    for record in reader.deserialize() {
        let record: StoredMetadata = record?;
        let title = record.title.clone();
        if !table.insert(record) {
            warn!(title = title.as_str(), "ignoring duplicate metadata record");
        }
    }

    Ok(table)
}

pub fn write_metadata(table: &MetadataTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in table.records() {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_index_manifest(path: &Path) -> Result<IndexManifest> {
    require("neighbor index", path)?;
    let manifest = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(manifest)
}

pub fn write_index_manifest(manifest: &IndexManifest, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, manifest)?;
    out.flush()?;
    Ok(())
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// The raw Book-Crossing dumps are latin-1 encoded, every byte maps to the code point of the
/// same value.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| *byte as char).collect()
}

/// Reader over a raw input file with a header row. Lines that cannot be parsed, or that miss
/// one of the required columns, are skipped and counted.
struct RawTable {
    reader: csv::Reader<File>,
    positions: Vec<Option<usize>>,
    num_columns: usize,
    name: String,
}

impl RawTable {

    fn open(path: &Path, delimiter: u8, required: &[&str], optional: &[&str]) -> Result<Self> {

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.byte_headers()?
            .iter()
            .map(|header| latin1(header).trim().to_owned())
            .collect();

        let position = |column: &str| headers.iter().position(|header| header == column);

        let mut positions = Vec::with_capacity(required.len() + optional.len());
        for column in required {
            match position(*column) {
                Some(index) => positions.push(Some(index)),
                None => {
                    return Err(Error::InvalidInput(format!(
                        "{} lacks required column '{}'", path.display(), column)));
                },
            }
        }
        positions.extend(optional.iter().map(|column| position(*column)));

        let num_columns = headers.len();

        Ok(RawTable { reader, positions, num_columns, name: path.display().to_string() })
    }

    /// Calls `handle` with the decoded fields (required columns first, then optional ones) of
    /// every usable line. Lines with more fields than the header are skipped, shorter lines are
    /// kept with their trailing columns absent. `handle` returns `false` for lines it rejects,
    /// which are counted as skipped.
    fn for_each<F>(mut self, num_required: usize, mut handle: F)
        where F: FnMut(Vec<Option<String>>) -> bool {

        let mut num_skipped: u64 = 0;
        let mut num_read: u64 = 0;

        for record in self.reader.byte_records() {
            let record = match record {
                Ok(record) => record,
                Err(_) => {
                    num_skipped += 1;
                    continue;
                },
            };

            if record.len() > self.num_columns {
                num_skipped += 1;
                continue;
            }

            let fields: Vec<Option<String>> = self.positions.iter()
                .map(|position| {
                    position
                        .and_then(|index| record.get(index))
                        .map(|field| latin1(field).trim().to_owned())
                        .filter(|field| !field.is_empty())
                })
                .collect();

            if fields[..num_required].iter().any(Option::is_none) {
                num_skipped += 1;
                continue;
            }

            if handle(fields) {
                num_read += 1;
            } else {
                num_skipped += 1;
            }
        }

        if num_skipped > 0 {
            warn!(file = self.name.as_str(), num_skipped, "skipped malformed lines");
        }
        info!(file = self.name.as_str(), num_read, "read raw input");
    }
}

/// Reads `User-ID;ISBN;Book-Rating` rows.
pub fn read_ratings(path: &Path) -> Result<Vec<RatingRow>> {

    let table = RawTable::open(path, b';', &["User-ID", "ISBN", "Book-Rating"], &[])?;

    let mut ratings = Vec::new();
    table.for_each(3, |mut fields| {
        let rating = fields[2].take().and_then(|rating| rating.parse::<f32>().ok());
        match (fields[0].take(), fields[1].take(), rating) {
            (Some(user_id), Some(isbn), Some(rating)) => {
                ratings.push(RatingRow { user_id, isbn, rating });
                true
            },
            _ => false,
        }
    });

    Ok(ratings)
}

/// Reads the `;`-separated book table, only the large cover image is retained.
pub fn read_books(path: &Path) -> Result<Vec<BookRow>> {

    let table = RawTable::open(
        path,
        b';',
        &["ISBN", "Book-Title"],
        &["Book-Author", "Year-Of-Publication", "Publisher", "Image-URL-L"],
    )?;

    let mut books = Vec::new();
    table.for_each(2, |mut fields| {
        if let (Some(isbn), Some(title)) = (fields[0].take(), fields[1].take()) {
            books.push(BookRow {
                isbn,
                title,
                author: fields[2].take(),
                year: fields[3].take(),
                publisher: fields[4].take(),
                image_url: fields[5].take(),
            });
            true
        } else {
            false
        }
    });

    Ok(books)
}

/// Reads the `,`-separated genre table with columns `ISBN` and `genre`.
pub fn read_genres(path: &Path) -> Result<Vec<GenreRow>> {

    let table = RawTable::open(path, b',', &["ISBN"], &["genre"])?;

    let mut genres = Vec::new();
    table.for_each(1, |mut fields| {
        if let Some(isbn) = fields[0].take() {
            genres.push(GenreRow { isbn, genre: fields[1].take() });
            true
        } else {
            false
        }
    });

    Ok(genres)
}

/// Reads one title per line, skipping blank lines.
pub fn read_titles(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);

    let mut titles = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let title = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
        if !title.trim().is_empty() {
            titles.push(title.to_owned());
        }
    }

    Ok(titles)
}

/// Output the computed recommendations in JSON format, one line per queried title. If an
/// `output_path` is supplied, we write to a file at the specified path, otherwise, we output
/// to stdout.
pub fn write_recommendations(
    results: &[(String, Result<RecommendationResult>)],
    output_path: Option<String>,
) -> Result<()> {

    let mut out: Box<dyn Write> = match output_path {
        Some(path) => Box::new(BufWriter::new(File::create(&Path::new(&path))?)),
        _ => Box::new(stdout())
    };

    for (for_title, result) in results {

        let line = match result {
            Ok(recommendations) => {
                let recommendations: Vec<serde_json::Value> = recommendations.iter()
                    .map(|recommendation| {
                        let metadata = &recommendation.metadata;
                        json!({
                            "title": recommendation.title,
                            "distance": recommendation.distance,
                            "author": metadata.author,
                            "year": metadata.year,
                            "genre": metadata.genre,
                            "image_url": metadata.image_url,
                            "avg_rating": metadata.avg_rating,
                            "num_ratings": metadata.num_ratings,
                        })
                    })
                    .collect();

                json!({ "for_title": for_title, "recommendations": recommendations })
            },
            Err(failure) => json!({ "for_title": for_title, "error": failure.to_string() }),
        };

        writeln!(out, "{}", line)?;
    }

    out.flush()?;
    Ok(())
}


#[cfg(test)]
mod tests {

    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::metadata::StoredMetadata;
    use crate::utils;

    fn write(dir: &Path, name: &str, content: &[u8]) -> ::std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn feature_matrix_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FEATURE_MATRIX_FILE);

        let columns = vec!["254".to_string(), "2276".to_string()];
        let matrix = ItemFeatureMatrix::from_rows(columns, vec![
            ("1984".to_string(), vec![9.0, 0.0]),
            ("Animal Farm, Illustrated".to_string(), vec![0.0, 7.5]),
        ]).unwrap();

        write_feature_matrix(&matrix, &path).unwrap();
        let restored = read_feature_matrix(&path).unwrap();

        assert_eq!(restored, matrix);
        assert_eq!(restored.fingerprint(), matrix.fingerprint());
    }

    #[test]
    fn malformed_feature_matrices_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let ragged = write(dir.path(), "ragged.csv", b"title,1,2\nAlpha,1,2\nBeta,1\n");
        assert!(read_feature_matrix(&ragged).is_err());

        let textual = write(dir.path(), "textual.csv", b"title,1\nAlpha,high\n");
        match read_feature_matrix(&textual) {
            Err(Error::InvalidArtifact(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }

        let duplicated = write(dir.path(), "duplicated.csv", b"title,1\nAlpha,1\nAlpha,2\n");
        assert!(read_feature_matrix(&duplicated).is_err());
    }

    #[test]
    fn missing_artifacts_are_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();

        match read_feature_matrix(&dir.path().join(FEATURE_MATRIX_FILE)) {
            Err(Error::ArtifactMissing { artifact, .. }) => assert_eq!(artifact, "feature matrix"),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(match read_metadata(&dir.path().join(METADATA_FILE)) {
            Err(Error::ArtifactMissing { .. }) => true,
            _ => false,
        });
        assert!(match read_index_manifest(&dir.path().join(NEIGHBOR_INDEX_FILE)) {
            Err(Error::ArtifactMissing { .. }) => true,
            _ => false,
        });
    }

    #[test]
    fn metadata_keeps_absent_fields_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);

        let mut sparse = StoredMetadata::new("Beta");
        sparse.avg_rating = Some(7.25);

        let table = MetadataTable::from_records(vec![sparse.clone()]);
        write_metadata(&table, &path).unwrap();

        let restored = read_metadata(&path).unwrap();
        assert_eq!(restored.get("Beta"), Some(&sparse));
    }

    #[test]
    fn raw_inputs_are_decoded_as_latin1_and_bad_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();

        let ratings = write(dir.path(), "ratings.csv",
            b"\"User-ID\";\"ISBN\";\"Book-Rating\"\n\"276725\";\"034545104X\";\"0\"\n\"276726\";\"0155061224\";\"five\"\n\"276727\";\"0446520802\";\"7\"\n");
        let ratings = read_ratings(&ratings).unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[1].user_id, "276727");
        assert_eq!(ratings[1].rating, 7.0);

        let books = write(dir.path(), "books.csv",
            b"ISBN;Book-Title;Book-Author;Year-Of-Publication;Publisher;Image-URL-S;Image-URL-M;Image-URL-L\n0195153448;Classical Mythology;Mark P. O. Morford;2002;Oxford University Press;s.jpg;m.jpg;http://images.example.com/l.jpg\n0002005018;Clara Callan;Richard Bruce Wright;2001;HarperFlamingo Canada;;;\n0399135782;The Kitchen God\xe6s Wife;Amy Tan;1991\n");
        let books = read_books(&books).unwrap();
        assert_eq!(books.len(), 3);
        assert_eq!(books[0].image_url.as_ref().unwrap(), "http://images.example.com/l.jpg");
        assert_eq!(books[1].image_url, None);
        assert_eq!(books[2].title, "The Kitchen God\u{e6}s Wife");
        assert_eq!(books[2].publisher, None);

        let genres = write(dir.path(), "genre.csv", b"ISBN,genre\n0195153448,\"Mythology, Classics\"\n0002005018,\n");
        let genres = read_genres(&genres).unwrap();
        assert_eq!(genres.len(), 2);
        assert_eq!(genres[0].genre.as_ref().unwrap(), "Mythology, Classics");
        assert_eq!(genres[1].genre, None);
    }

    #[test]
    fn lines_with_surplus_fields_are_skipped() {
        let dir = tempfile::tempdir().unwrap();

        let books = write(dir.path(), "books.csv",
            b"ISBN;Book-Title;Book-Author;Year-Of-Publication;Publisher;Image-URL-L\n\
              0001;Good Title;Ann;1999;Pub;http://images.example.com/1.jpg\n\
              0002;Bad; Title;Bob;1999;Pub;http://images.example.com/2.jpg\n\
              0003;Short Title;Cid\n");

        let mut read = Vec::new();
        let logs = utils::capture_logs(|| {
            read = read_books(&books).unwrap();
        });

        let titles: Vec<&str> = read.iter().map(|book| book.title.as_str()).collect();
        assert_eq!(titles, vec!["Good Title", "Short Title"]);
        assert_eq!(read[1].author.as_ref().unwrap(), "Cid");
        assert_eq!(read[1].image_url, None);
        assert!(logs.contains("num_skipped=1"));
        assert!(logs.contains("num_read=2"));
    }

    #[test]
    fn unparseable_ratings_count_as_skipped() {
        let dir = tempfile::tempdir().unwrap();

        let ratings = write(dir.path(), "ratings.csv",
            b"User-ID;ISBN;Book-Rating\n1;A;5\n2;B;five\n3;C;\n4;D;0\n");

        let mut read = Vec::new();
        let logs = utils::capture_logs(|| {
            read = read_ratings(&ratings).unwrap();
        });

        assert_eq!(read.len(), 2);
        assert!(logs.contains("num_skipped=2"));
        assert!(logs.contains("num_read=2"));
    }

    #[test]
    fn raw_inputs_require_their_columns() {
        let dir = tempfile::tempdir().unwrap();
        let ratings = write(dir.path(), "ratings.csv", b"User-ID;Rating\n1;2\n");

        assert!(read_ratings(&ratings).is_err());
    }

    #[test]
    fn titles_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let titles = write(dir.path(), "titles.txt", b"Alpha\r\n\n  \nThe Beta, Part 2\n");

        assert_eq!(read_titles(&titles).unwrap(), vec!["Alpha", "The Beta, Part 2"]);
    }
}
