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

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use tracing::info;

use crate::error::{Error, Result};
use crate::io;
use crate::metadata::MetadataTable;
use crate::neighbors::{Metric, NeighborIndex};
use crate::types::ItemFeatureMatrix;
use crate::utils;

/// Everything a lookup needs: the feature matrix, the neighbor index fitted on it and the
/// metadata table. Never mutated after construction, a retrained model means a new bundle.
#[derive(Debug)]
pub struct ArtifactBundle {
    index: NeighborIndex,
    metadata: MetadataTable,
}

impl ArtifactBundle {

    /// Fits a fresh index over `matrix`.
    pub fn new(matrix: ItemFeatureMatrix, metric: Metric, metadata: MetadataTable) -> Self {
        let index = NeighborIndex::fit(Arc::new(matrix), metric);
        ArtifactBundle { index, metadata }
    }

    pub fn from_parts(index: NeighborIndex, metadata: MetadataTable) -> Self {
        ArtifactBundle { index, metadata }
    }

    /// Loads all three artifacts from `dir`, failing if any of them is missing or if the
    /// persisted index does not belong to the persisted matrix.
    pub fn load(dir: &Path) -> Result<Self> {

        let load_start = Instant::now();

        let matrix = io::read_feature_matrix(&dir.join(io::FEATURE_MATRIX_FILE))?;
        let manifest = io::read_index_manifest(&dir.join(io::NEIGHBOR_INDEX_FILE))?;
        let metadata = io::read_metadata(&dir.join(io::METADATA_FILE))?;

        let index = NeighborIndex::from_manifest(Arc::new(matrix), &manifest)?;

        info!(
            dir = %dir.display(),
            num_titles = index.matrix().num_rows(),
            num_users = index.matrix().num_columns(),
            num_metadata_records = metadata.len(),
            metric = %index.metric(),
            duration_ms = utils::to_millis(load_start.elapsed()),
            "loaded artifact bundle");

        Ok(ArtifactBundle { index, metadata })
    }

    /// Writes all three artifacts to `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        io::ensure_dir(dir)?;
        io::write_feature_matrix(self.matrix(), &dir.join(io::FEATURE_MATRIX_FILE))?;
        io::write_metadata(&self.metadata, &dir.join(io::METADATA_FILE))?;
        io::write_index_manifest(&self.index.manifest(), &dir.join(io::NEIGHBOR_INDEX_FILE))?;

        info!(dir = %dir.display(), "saved artifact bundle");
        Ok(())
    }

    pub fn matrix(&self) -> &ItemFeatureMatrix {
        self.index.matrix()
    }

    pub fn index(&self) -> &NeighborIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// All known titles in matrix row order.
    pub fn titles(&self) -> &[String] {
        self.matrix().titles()
    }
}

/// Holds the bundle currently serving lookups. Readers take a snapshot and keep using it for
/// the rest of their call, installing a new bundle is a single pointer swap.
#[derive(Default)]
pub struct BundleSlot {
    current: ArcSwapOption<ArtifactBundle>,
}

impl BundleSlot {

    pub fn empty() -> Self {
        BundleSlot { current: ArcSwapOption::empty() }
    }

    pub fn with_bundle(bundle: ArtifactBundle) -> Self {
        BundleSlot { current: ArcSwapOption::from_pointee(bundle) }
    }

    /// The bundle installed right now, or `ArtifactMissing` if none was installed yet.
    pub fn snapshot(&self) -> Result<Arc<ArtifactBundle>> {
        self.current
            .load_full()
            .ok_or_else(|| Error::artifact_missing("artifact bundle"))
    }

    /// Replaces the current bundle, returning the previous one.
    pub fn install(&self, bundle: ArtifactBundle) -> Option<Arc<ArtifactBundle>> {
        self.current.swap(Some(Arc::new(bundle)))
    }

    /// Loads a complete bundle from `dir` and only then installs it. On failure the previous
    /// bundle keeps serving.
    pub fn reload(&self, dir: &Path) -> Result<()> {
        let bundle = ArtifactBundle::load(dir)?;
        self.install(bundle);
        Ok(())
    }
}


#[cfg(test)]
mod tests {

    use std::fs;

    use super::{ArtifactBundle, BundleSlot};
    use crate::error::Error;
    use crate::io;
    use crate::metadata::{MetadataTable, StoredMetadata};
    use crate::neighbors::Metric;
    use crate::types::ItemFeatureMatrix;

    fn bundle(titles: &[&str]) -> ArtifactBundle {
        let columns = vec!["1".to_string(), "2".to_string()];
        let rows = titles.iter()
            .enumerate()
            .map(|(position, title)| (title.to_string(), vec![position as f32, 1.0]));
        let matrix = ItemFeatureMatrix::from_rows(columns, rows).unwrap();
        let metadata = MetadataTable::from_records(titles.iter().map(|title| StoredMetadata::new(title)));

        ArtifactBundle::new(matrix, Metric::Euclidean, metadata)
    }

    #[test]
    fn empty_slot_reports_missing_artifacts() {
        let slot = BundleSlot::empty();

        match slot.snapshot() {
            Err(Error::ArtifactMissing { .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn install_swaps_whole_bundles() {
        let slot = BundleSlot::with_bundle(bundle(&["Alpha", "Beta"]));
        let before = slot.snapshot().unwrap();

        let previous = slot.install(bundle(&["Gamma"])).unwrap();

        assert_eq!(previous.titles(), &["Alpha", "Beta"]);
        assert_eq!(before.titles(), &["Alpha", "Beta"]);
        assert_eq!(slot.snapshot().unwrap().titles(), &["Gamma"]);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let original = bundle(&["Alpha", "Beta", "Gamma"]);

        original.save(dir.path()).unwrap();
        let restored = ArtifactBundle::load(dir.path()).unwrap();

        assert_eq!(restored.matrix(), original.matrix());
        assert_eq!(restored.metadata(), original.metadata());
        assert_eq!(restored.index().manifest(), original.index().manifest());
    }

    #[test]
    fn failed_reload_keeps_serving_the_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        bundle(&["Delta", "Epsilon"]).save(dir.path()).unwrap();

        let slot = BundleSlot::with_bundle(bundle(&["Alpha"]));

        fs::remove_file(dir.path().join(io::METADATA_FILE)).unwrap();
        assert!(slot.reload(dir.path()).is_err());
        assert_eq!(slot.snapshot().unwrap().titles(), &["Alpha"]);

        bundle(&["Delta", "Epsilon"]).save(dir.path()).unwrap();
        slot.reload(dir.path()).unwrap();
        assert_eq!(slot.snapshot().unwrap().titles(), &["Delta", "Epsilon"]);
    }

    #[test]
    fn index_from_another_matrix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();

        bundle(&["Alpha", "Beta"]).save(dir.path()).unwrap();
        bundle(&["Alpha", "Gamma"]).save(other.path()).unwrap();
        fs::copy(other.path().join(io::NEIGHBOR_INDEX_FILE), dir.path().join(io::NEIGHBOR_INDEX_FILE))
            .unwrap();

        match ArtifactBundle::load(dir.path()) {
            Err(Error::InvalidArtifact(_)) => {},
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }
}
