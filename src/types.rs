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

use std::hash::Hasher;

use fnv::{FnvHashMap, FnvHasher};

use crate::error::{Error, Result};

pub type DenseVector = Vec<f32>;

pub fn new_dense_vector(dimensions: usize) -> DenseVector {
    vec![0.0; dimensions]
}

/// Item-by-user rating matrix. One row per unique title in construction order, one column per
/// retained user, unrated cells are zero. Rows are stored back to back in a single buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFeatureMatrix {
    columns: Vec<String>,
    titles: Vec<String>,
    title_index: FnvHashMap<String, u32>,
    values: Vec<f32>,
}

impl ItemFeatureMatrix {

    pub fn new(columns: Vec<String>) -> Self {
        ItemFeatureMatrix {
            columns,
            titles: Vec::new(),
            title_index: FnvHashMap::default(),
            values: Vec::new(),
        }
    }

    pub fn from_rows<I>(columns: Vec<String>, rows: I) -> Result<Self>
        where I: IntoIterator<Item=(String, DenseVector)> {

        let mut matrix = ItemFeatureMatrix::new(columns);
        for (title, row) in rows {
            matrix.push_row(title, &row)?;
        }

        Ok(matrix)
    }

    /// Appends a row. Titles are the identity of a row, so a second row for the same title is
    /// rejected, as is a row that does not span exactly the column universe.
    pub fn push_row(&mut self, title: String, row: &[f32]) -> Result<()> {

        if row.len() != self.columns.len() {
            return Err(Error::InvalidArtifact(format!(
                "row for '{}' has {} values, expected {}", title, row.len(), self.columns.len())));
        }

        if self.title_index.contains_key(&title) {
            return Err(Error::InvalidArtifact(format!("duplicate row for title '{}'", title)));
        }

        self.title_index.insert(title.clone(), self.titles.len() as u32);
        self.titles.push(title);
        self.values.extend_from_slice(row);

        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.titles.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All titles in row order.
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn title(&self, row_index: usize) -> Option<&str> {
        self.titles.get(row_index).map(String::as_str)
    }

    #[inline]
    pub fn row(&self, row_index: usize) -> &[f32] {
        let start = row_index * self.columns.len();
        &self.values[start..start + self.columns.len()]
    }

    /// Exact, case-sensitive lookup of the row holding `title`.
    pub fn resolve(&self, title: &str) -> Result<usize> {
        self.title_index
            .get(title)
            .map(|row_index| *row_index as usize)
            .ok_or_else(|| Error::NotFound(title.to_owned()))
    }

    /// FNV-1a digest over titles, shape and cell values. A neighbor index remembers the digest
    /// of the matrix it was fitted on, which lets us detect artifacts that drifted apart.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FnvHasher::default();

        hasher.write_u64(self.columns.len() as u64);
        for title in &self.titles {
            hasher.write(title.as_bytes());
            hasher.write_u8(0xff);
        }
        for value in &self.values {
            hasher.write_u32(value.to_bits());
        }

        hasher.finish()
    }
}


#[cfg(test)]
mod tests {

    use super::ItemFeatureMatrix;

    fn columns(n: usize) -> Vec<String> {
        (0..n).map(|user| user.to_string()).collect()
    }

    fn matrix() -> ItemFeatureMatrix {
        ItemFeatureMatrix::from_rows(columns(3), vec![
            ("Alpha".to_string(), vec![1.0, 0.0, 5.0]),
            ("Beta".to_string(), vec![0.0, 7.0, 0.0]),
            ("Gamma".to_string(), vec![3.0, 3.0, 3.0]),
        ]).unwrap()
    }

    #[test]
    fn rows_keep_construction_order() {
        let matrix = matrix();

        assert_eq!(matrix.num_rows(), 3);
        assert_eq!(matrix.num_columns(), 3);
        assert_eq!(matrix.titles(), &["Alpha", "Beta", "Gamma"]);
        assert_eq!(matrix.row(1), &[0.0, 7.0, 0.0]);
        assert_eq!(matrix.title(2), Some("Gamma"));
        assert_eq!(matrix.title(3), None);
    }

    #[test]
    fn resolve_is_exact_and_case_sensitive() {
        let matrix = matrix();

        assert_eq!(matrix.resolve("Beta").unwrap(), 1);
        assert!(matrix.resolve("beta").unwrap_err().is_not_found());
        assert!(matrix.resolve(" Beta").unwrap_err().is_not_found());
        assert!(matrix.resolve("Nonexistent Title").unwrap_err().is_not_found());
    }

    #[test]
    fn ragged_and_duplicate_rows_are_rejected() {
        let mut matrix = matrix();

        assert!(matrix.push_row("Delta".to_string(), &[1.0]).is_err());
        assert!(matrix.push_row("Alpha".to_string(), &[1.0, 1.0, 1.0]).is_err());
        assert_eq!(matrix.num_rows(), 3);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let original = matrix();
        let mut changed = matrix();
        changed.push_row("Delta".to_string(), &[0.0, 0.0, 1.0]).unwrap();

        assert_eq!(original.fingerprint(), matrix().fingerprint());
        assert_ne!(original.fingerprint(), changed.fingerprint());
    }
}
