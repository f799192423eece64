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

use fnv::FnvHashMap;
use tracing::warn;

pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/150x200?text=No+Cover";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_GENRE: &str = "Unknown Genre";
pub const UNKNOWN_YEAR: &str = "N/A";

/// Display metadata for a single title, with every field filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub author: String,
    pub year: String,
    /// Free-text tags joined by commas.
    pub genre: String,
    pub image_url: String,
    pub avg_rating: f64,
    pub num_ratings: u32,
}

/// Metadata as it comes out of the builder. Any field except the title may be absent, empty
/// cells in the metadata artifact deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMetadata {
    pub title: String,
    pub author: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub image_url: Option<String>,
    pub avg_rating: Option<f64>,
    pub num_ratings: Option<u32>,
}

impl StoredMetadata {
    pub fn new(title: &str) -> Self {
        StoredMetadata { title: title.to_owned(), ..Default::default() }
    }
}

/// Lookup table from title to stored metadata. The first record seen for a title wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    records: Vec<StoredMetadata>,
    by_title: FnvHashMap<String, usize>,
}

impl MetadataTable {

    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_records<I>(records: I) -> Self
        where I: IntoIterator<Item=StoredMetadata> {

        let mut table = MetadataTable::new();
        for record in records {
            table.insert(record);
        }
        table
    }

    /// Returns false if the title was already present, in which case the table is unchanged.
    pub fn insert(&mut self, record: StoredMetadata) -> bool {
        if self.by_title.contains_key(&record.title) {
            return false;
        }

        self.by_title.insert(record.title.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, title: &str) -> Option<&StoredMetadata> {
        self.by_title.get(title).map(|position| &self.records[*position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[StoredMetadata] {
        &self.records
    }
}

/// Shape check applied to cover image URLs before they are handed to a UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePolicy {
    /// Only requires an http or https scheme.
    Lenient,
    /// Additionally rejects links to files with one of the listed extensions.
    Strict { disallowed_extensions: Vec<String> },
}

impl Default for ImagePolicy {
    fn default() -> Self {
        ImagePolicy::Strict { disallowed_extensions: vec![".gif".to_owned()] }
    }
}

impl ImagePolicy {

    pub fn accepts(&self, url: &str) -> bool {
        let url = url.trim().to_ascii_lowercase();

        let rest = if url.starts_with("https://") {
            &url["https://".len()..]
        } else if url.starts_with("http://") {
            &url["http://".len()..]
        } else {
            return false;
        };

        if rest.is_empty() {
            return false;
        }

        match self {
            ImagePolicy::Lenient => true,
            ImagePolicy::Strict { disallowed_extensions } => {
                let path = rest.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
                !disallowed_extensions.iter()
                    .any(|extension| path.ends_with(&extension.to_ascii_lowercase()))
            }
        }
    }
}

/// How missing or unusable metadata is replaced during hydration.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrationPolicy {
    pub image_policy: ImagePolicy,
    pub placeholder_url: String,
}

impl Default for HydrationPolicy {
    fn default() -> Self {
        HydrationPolicy {
            image_policy: ImagePolicy::default(),
            placeholder_url: PLACEHOLDER_IMAGE_URL.to_owned(),
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_ref()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Looks up the metadata of a single title and fills in every absent or unusable field. Never
/// fails; degraded records are reported as warnings.
pub fn hydrate_one(table: &MetadataTable, title: &str, policy: &HydrationPolicy) -> MetadataRecord {

    let stored = match table.get(title) {
        Some(stored) => stored,
        None => {
            warn!(title, "no metadata for title, using fallback record");
            return MetadataRecord {
                title: title.to_owned(),
                author: UNKNOWN_AUTHOR.to_owned(),
                year: UNKNOWN_YEAR.to_owned(),
                genre: UNKNOWN_GENRE.to_owned(),
                image_url: policy.placeholder_url.clone(),
                avg_rating: 0.0,
                num_ratings: 0,
            };
        },
    };

    let mut degraded: Vec<&'static str> = Vec::new();

    let author = match present(&stored.author) {
        Some(author) => author.to_owned(),
        None => {
            degraded.push("author");
            UNKNOWN_AUTHOR.to_owned()
        },
    };

    // The raw data uses a year of 0 for unknown publication dates
    let year = match present(&stored.year).filter(|year| *year != "0") {
        Some(year) => year.to_owned(),
        None => {
            degraded.push("year");
            UNKNOWN_YEAR.to_owned()
        },
    };

    let genre = match present(&stored.genre) {
        Some(genre) => genre.to_owned(),
        None => {
            degraded.push("genre");
            UNKNOWN_GENRE.to_owned()
        },
    };

    let image_url = match present(&stored.image_url).filter(|url| policy.image_policy.accepts(url)) {
        Some(url) => url.to_owned(),
        None => {
            degraded.push("image_url");
            policy.placeholder_url.clone()
        },
    };

    let avg_rating = match stored.avg_rating.filter(|rating| rating.is_finite()) {
        Some(rating) => rating,
        None => {
            degraded.push("avg_rating");
            0.0
        },
    };

    let num_ratings = match stored.num_ratings {
        Some(count) => count,
        None => {
            degraded.push("num_ratings");
            0
        },
    };

    if !degraded.is_empty() {
        warn!(title, fields = ?degraded, "hydrated title with fallback metadata");
    }

    MetadataRecord {
        title: title.to_owned(),
        author,
        year,
        genre,
        image_url,
        avg_rating,
        num_ratings,
    }
}

/// Hydrates every title, in order.
pub fn hydrate<S>(table: &MetadataTable, titles: &[S], policy: &HydrationPolicy) -> Vec<MetadataRecord>
    where S: AsRef<str> {

    titles.iter()
        .map(|title| hydrate_one(table, title.as_ref(), policy))
        .collect()
}
