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

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested title has no row in the feature matrix. Recoverable by asking for another
    /// title, see `Recommender::titles`.
    #[error("Title not found: {0}")]
    NotFound(String),

    /// An artifact has not been built yet (or no bundle has been installed at all).
    #[error("Artifact missing: {artifact} (expected at {path:?})")]
    ArtifactMissing {
        artifact: &'static str,
        path: Option<PathBuf>,
    },

    /// An artifact exists but contradicts itself or its companion artifacts.
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {

    pub fn artifact_missing(artifact: &'static str) -> Self {
        Error::ArtifactMissing { artifact, path: None }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            _ => false,
        }
    }
}
