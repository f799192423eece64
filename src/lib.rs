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

//! Similar-book recommendations. An offline builder turns raw ratings into an item-by-user rating
//! matrix and a metadata table, a brute-force nearest-neighbor index over the matrix then answers
//! "which books were rated like this one?" for a given title.

extern crate arc_swap;
extern crate csv;
extern crate dotenvy;
extern crate fnv;
extern crate scoped_pool;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate thiserror;
extern crate tracing;
extern crate tracing_subscriber;

pub mod builder;
pub mod bundle;
pub mod config;
pub mod error;
pub mod io;
pub mod metadata;
pub mod neighbors;
pub mod recommend;
pub mod stats;
pub mod types;
pub mod utils;

pub use bundle::{ArtifactBundle, BundleSlot};
pub use config::Config;
pub use error::{Error, Result};
pub use metadata::{HydrationPolicy, ImagePolicy, MetadataRecord, MetadataTable};
pub use neighbors::{Metric, Neighbor, NeighborIndex};
pub use recommend::{Recommendation, RecommendationResult, Recommender};
pub use types::ItemFeatureMatrix;
