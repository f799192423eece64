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

use scoped_pool::Pool;
use tracing::{debug, info};

use crate::bundle::{ArtifactBundle, BundleSlot};
use crate::error::Result;
use crate::metadata::{self, HydrationPolicy, MetadataRecord};
use crate::utils;

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub distance: f64,
    pub metadata: MetadataRecord,
}

/// Books similar to a queried book: the queried book first, then its neighbors by ascending
/// distance.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationResult {
    recommendations: Vec<Recommendation>,
}

impl RecommendationResult {

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn iter(&self) -> ::std::slice::Iter<'_, Recommendation> {
        self.recommendations.iter()
    }

    /// The queried book itself.
    pub fn query(&self) -> Option<&Recommendation> {
        self.recommendations.first()
    }

    /// Everything except the queried book.
    pub fn similar(&self) -> &[Recommendation] {
        if self.recommendations.is_empty() {
            &[]
        } else {
            &self.recommendations[1..]
        }
    }

    pub fn titles(&self) -> Vec<&str> {
        self.recommendations.iter().map(|recommendation| recommendation.title.as_str()).collect()
    }

    /// Display metadata, parallel to `titles`.
    pub fn metadata(&self) -> Vec<&MetadataRecord> {
        self.recommendations.iter().map(|recommendation| &recommendation.metadata).collect()
    }

    pub fn into_vec(self) -> Vec<Recommendation> {
        self.recommendations
    }
}

impl IntoIterator for RecommendationResult {
    type Item = Recommendation;
    type IntoIter = ::std::vec::IntoIter<Recommendation>;

    fn into_iter(self) -> Self::IntoIter {
        self.recommendations.into_iter()
    }
}

/// Resolves `title` to its row, queries the `k` nearest rows and hydrates their metadata. Fails
/// only with `NotFound` for titles without a row.
pub fn recommend(
    bundle: &ArtifactBundle,
    title: &str,
    k: usize,
    policy: &HydrationPolicy,
) -> Result<RecommendationResult> {

    let matrix = bundle.matrix();
    let row_index = matrix.resolve(title)?;

    let neighbors = bundle.index().query(row_index, k);

    let titles: Vec<&str> = neighbors.iter()
        .filter_map(|neighbor| matrix.title(neighbor.row))
        .collect();

    let records = metadata::hydrate(bundle.metadata(), &titles, policy);

    let recommendations = neighbors.into_iter()
        .zip(records.into_iter())
        .map(|(neighbor, metadata)| {
            Recommendation { title: metadata.title.clone(), distance: neighbor.distance, metadata }
        })
        .collect();

    Ok(RecommendationResult { recommendations })
}

/// Entry point for a presentation layer. Lookups run against whatever bundle is installed when
/// they start, reloads swap the whole bundle atomically.
pub struct Recommender {
    slot: BundleSlot,
    policy: HydrationPolicy,
}

impl Recommender {

    pub fn new(policy: HydrationPolicy) -> Self {
        Recommender { slot: BundleSlot::empty(), policy }
    }

    pub fn with_bundle(bundle: ArtifactBundle, policy: HydrationPolicy) -> Self {
        Recommender { slot: BundleSlot::with_bundle(bundle), policy }
    }

    pub fn load(dir: &Path, policy: HydrationPolicy) -> Result<Self> {
        let bundle = ArtifactBundle::load(dir)?;
        Ok(Recommender::with_bundle(bundle, policy))
    }

    pub fn install(&self, bundle: ArtifactBundle) {
        self.slot.install(bundle);
        info!("installed new artifact bundle");
    }

    /// Swaps in the artifacts from `dir`, see `BundleSlot::reload`.
    pub fn reload(&self, dir: &Path) -> Result<()> {
        self.slot.reload(dir)
    }

    pub fn snapshot(&self) -> Result<Arc<ArtifactBundle>> {
        self.slot.snapshot()
    }

    pub fn policy(&self) -> &HydrationPolicy {
        &self.policy
    }

    /// The `k` books most similar to `title`, the book itself included as the first entry.
    pub fn recommend(&self, title: &str, k: usize) -> Result<RecommendationResult> {
        let bundle = self.slot.snapshot()?;

        let lookup_start = Instant::now();
        let result = recommend(&bundle, title, k, &self.policy);

        debug!(
            title,
            k,
            found = result.is_ok(),
            duration_ms = utils::to_millis(lookup_start.elapsed()),
            "recommendation lookup");

        result
    }

    /// All known titles in matrix row order, e.g. to populate a selection control.
    pub fn titles(&self) -> Result<Vec<String>> {
        Ok(self.slot.snapshot()?.titles().to_vec())
    }

    /// Runs one lookup per title on a pool of `pool_size` threads. All lookups see the same
    /// bundle, results come back in input order.
    pub fn recommend_all(
        &self,
        titles: &[String],
        k: usize,
        pool_size: usize,
    ) -> Result<Vec<Result<RecommendationResult>>> {

        let bundle = self.slot.snapshot()?;
        let policy = &self.policy;

        let batch_start = Instant::now();

        let pool_size = pool_size.max(1);
        let chunk_size = ((titles.len() + pool_size - 1) / pool_size).max(1);
        let mut chunk_results: Vec<Vec<Result<RecommendationResult>>> =
            titles.chunks(chunk_size).map(|_| Vec::new()).collect();

        let pool = Pool::new(pool_size);

        pool.scoped(|scope| {
            for (chunk, results) in titles.chunks(chunk_size).zip(chunk_results.iter_mut()) {
                let bundle = &bundle;
                scope.execute(move || {
                    results.extend(chunk.iter().map(|title| recommend(bundle, title, k, policy)));
                });
            }
        });

        pool.shutdown();

        info!(
            num_titles = titles.len(),
            num_threads = pool_size,
            duration_ms = utils::to_millis(batch_start.elapsed()),
            "computed batch recommendations");

        Ok(chunk_results.into_iter().flatten().collect())
    }
}


#[cfg(test)]
mod tests {

    use super::Recommender;
    use crate::bundle::ArtifactBundle;
    use crate::error::Error;
    use crate::metadata::{HydrationPolicy, MetadataTable, StoredMetadata, PLACEHOLDER_IMAGE_URL};
    use crate::neighbors::Metric;
    use crate::types::ItemFeatureMatrix;

    fn titled(title: &str, image_url: &str) -> StoredMetadata {
        StoredMetadata {
            title: title.to_owned(),
            author: Some("Some Author".to_owned()),
            year: Some("2004".to_owned()),
            genre: Some("Fiction".to_owned()),
            image_url: Some(image_url.to_owned()),
            avg_rating: Some(7.1),
            num_ratings: Some(55),
        }
    }

    fn bundle() -> ArtifactBundle {
        let columns = vec!["11".to_string(), "12".to_string(), "13".to_string()];
        let matrix = ItemFeatureMatrix::from_rows(columns, vec![
            ("Alpha".to_string(), vec![8.0, 0.0, 6.0]),
            ("Beta".to_string(), vec![8.0, 0.0, 6.0]),
            ("Gamma".to_string(), vec![0.0, 9.0, 0.0]),
            ("Delta".to_string(), vec![7.0, 0.0, 6.0]),
        ]).unwrap();

        let metadata = MetadataTable::from_records(vec![
            titled("Alpha", "http://images.example.com/alpha.jpg"),
            titled("Beta", "http://images.example.com/beta.jpg"),
            titled("Gamma", "cover.gif"),
        ]);

        ArtifactBundle::new(matrix, Metric::Euclidean, metadata)
    }

    fn recommender() -> Recommender {
        Recommender::with_bundle(bundle(), HydrationPolicy::default())
    }

    #[test]
    fn identical_rows_follow_the_query() {
        let result = recommender().recommend("Alpha", 2).unwrap();

        assert_eq!(result.titles(), vec!["Alpha", "Beta"]);
        assert_eq!(result.iter().nth(1).unwrap().distance, 0.0);
    }

    #[test]
    fn result_length_follows_k() {
        let recommender = recommender();

        for k in 1..5 {
            assert_eq!(recommender.recommend("Gamma", k).unwrap().len(), k);
        }
        assert_eq!(recommender.recommend("Gamma", 6).unwrap().len(), 4);
        assert_eq!(recommender.recommend("Gamma", 0).unwrap().len(), 1);
    }

    #[test]
    fn query_book_comes_first() {
        let recommender = recommender();

        for title in recommender.titles().unwrap() {
            let result = recommender.recommend(&title, 3).unwrap();
            assert_eq!(result.query().unwrap().title, title);
            assert_eq!(result.similar().len(), 2);
        }
    }

    #[test]
    fn unknown_titles_are_not_found() {
        match recommender().recommend("Nonexistent Title", 5) {
            Err(Error::NotFound(title)) => assert_eq!(title, "Nonexistent Title"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn metadata_is_hydrated_with_fallbacks() {
        let result = recommender().recommend("Delta", 4).unwrap();

        assert_eq!(result.titles(), vec!["Delta", "Alpha", "Beta", "Gamma"]);

        let metadata = result.metadata();
        assert_eq!(metadata[0].author, "Unknown Author");
        assert_eq!(metadata[0].image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(metadata[1].image_url, "http://images.example.com/alpha.jpg");
        assert_eq!(metadata[3].image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(metadata[3].genre, "Fiction");
    }

    #[test]
    fn repeated_lookups_are_identical() {
        let recommender = recommender();

        assert_eq!(
            recommender.recommend("Beta", 3).unwrap(),
            recommender.recommend("Beta", 3).unwrap());
    }

    #[test]
    fn missing_bundle() {
        let recommender = Recommender::new(HydrationPolicy::default());

        assert!(recommender.titles().is_err());
        match recommender.recommend("Alpha", 3) {
            Err(Error::ArtifactMissing { .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }

        recommender.install(bundle());
        assert_eq!(recommender.recommend("Alpha", 3).unwrap().len(), 3);
    }

    #[test]
    fn batch_matches_single_lookups() {
        let recommender = recommender();
        let titles: Vec<String> = vec!["Gamma", "Missing", "Alpha", "Delta", "Beta"]
            .into_iter()
            .map(String::from)
            .collect();

        let results = recommender.recommend_all(&titles, 3, 2).unwrap();

        assert_eq!(results.len(), titles.len());
        for (title, result) in titles.iter().zip(results.iter()) {
            match (result, recommender.recommend(title, 3)) {
                (Ok(batch), Ok(single)) => assert_eq!(*batch, single),
                (Err(batch), Err(single)) => {
                    assert!(batch.is_not_found());
                    assert!(single.is_not_found());
                },
                _ => panic!("batch and single lookup disagree for {}", title),
            }
        }
    }
}
