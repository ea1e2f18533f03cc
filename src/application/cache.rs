//! Validated, immutable snapshots of the approved garf list.
//!
//! Every `GarfCache` in the system satisfies the same invariants, enforced
//! in one place: the constructor. Filtering builds a new snapshot through
//! that same constructor rather than mutating in place, so a handler can
//! never observe a partially-updated or empty cache.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::domain::garfs;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache requires at least one approved garf")]
    Empty,
    #[error("garf names must be non-empty")]
    BlankName,
    #[error("no garfs left after applying filter")]
    EmptyResult,
}

/// Point-in-time projection of the approved directory.
///
/// Clones share the backing slice, so handing a snapshot to a request
/// handler is pointer-sized work.
#[derive(Debug, Clone)]
pub struct GarfCache {
    garfs: Arc<[String]>,
}

impl GarfCache {
    /// Build a snapshot from an ordered name list, rejecting empty input
    /// and blank members. Order is preserved verbatim.
    pub fn new(garfs: Vec<String>) -> Result<Self, CacheError> {
        if garfs.is_empty() {
            return Err(CacheError::Empty);
        }
        if garfs.iter().any(|name| name.trim().is_empty()) {
            return Err(CacheError::BlankName);
        }
        Ok(Self {
            garfs: garfs.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.garfs.len()
    }

    /// A live cache is never empty; kept for completeness.
    pub fn is_empty(&self) -> bool {
        self.garfs.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.garfs
    }

    /// Uniform pick over `[0, len)` using the supplied rng.
    pub fn pick_random(&self, rng: &mut impl Rng) -> &str {
        &self.garfs[rng.random_range(0..self.garfs.len())]
    }

    /// Uniform pick using the thread-local rng.
    pub fn random(&self) -> &str {
        self.pick_random(&mut rand::rng())
    }

    /// Keep each garf iff `criteria.contains(extension) == include_mode`.
    ///
    /// Criteria tokens arrive lowercased from the HTTP boundary; they are
    /// lowercased again here so the comparison is case-insensitive no
    /// matter the provenance. Fails rather than produce an empty snapshot.
    pub fn apply_filter(
        &self,
        criteria: &HashSet<String>,
        include_mode: bool,
    ) -> Result<GarfCache, CacheError> {
        let criteria: HashSet<String> = criteria
            .iter()
            .map(|token| token.to_ascii_lowercase())
            .collect();

        let filtered: Vec<String> = self
            .garfs
            .iter()
            .filter(|name| criteria.contains(&garfs::extension(name)) == include_mode)
            .cloned()
            .collect();

        if filtered.is_empty() {
            return Err(CacheError::EmptyResult);
        }

        // Re-validation through the constructor keeps the invariant check
        // single-point-of-truth.
        GarfCache::new(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn cache(names: &[&str]) -> GarfCache {
        GarfCache::new(names.iter().map(|s| s.to_string()).collect()).expect("valid cache")
    }

    fn criteria(tokens: &[&str]) -> HashSet<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(GarfCache::new(Vec::new()).unwrap_err(), CacheError::Empty);
    }

    #[test]
    fn blank_member_is_rejected_regardless_of_position() {
        for names in [
            vec!["".into()],
            vec!["".into(), "a.jpg".into()],
            vec!["a.jpg".into(), "  ".into(), "b.png".into()],
        ] {
            assert_eq!(GarfCache::new(names).unwrap_err(), CacheError::BlankName);
        }
    }

    #[test]
    fn order_is_preserved_verbatim() {
        let snapshot = cache(&["z.jpg", "a.png", "m.gif"]);
        assert_eq!(snapshot.names(), ["z.jpg", "a.png", "m.gif"]);
    }

    #[test]
    fn pick_random_returns_only_known_names_and_reaches_every_index() {
        let snapshot = cache(&["a.jpg", "b.png", "c.gif", "d.mp4"]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 4];

        for _ in 0..4000 {
            let picked = snapshot.pick_random(&mut rng);
            let index = snapshot
                .names()
                .iter()
                .position(|name| name == picked)
                .expect("pick must come from the snapshot");
            counts[index] += 1;
        }

        // Uniformity, not just reachability: each of the four indexes should
        // land near 1000 picks out of 4000.
        for count in counts {
            assert!((700..=1300).contains(&count), "skewed pick count: {count}");
        }
    }

    #[test]
    fn exclude_mode_drops_matching_extensions() {
        let snapshot = cache(&["a.jpg", "b.png"]);
        let filtered = snapshot
            .apply_filter(&criteria(&["jpg"]), false)
            .expect("one garf survives");
        assert_eq!(filtered.names(), ["b.png"]);
    }

    #[test]
    fn include_mode_keeps_only_matching_extensions() {
        let snapshot = cache(&["a.mp4", "a.jpg", "b.png"]);
        let filtered = snapshot
            .apply_filter(&criteria(&["jpg"]), true)
            .expect("one garf survives");
        assert_eq!(filtered.names(), ["a.jpg"]);
    }

    #[test]
    fn filtering_is_case_insensitive_on_both_sides() {
        let snapshot = cache(&["A.JPG"]);
        let filtered = snapshot
            .apply_filter(&criteria(&["jpg"]), true)
            .expect("match despite case");
        assert_eq!(filtered.names(), ["A.JPG"]);

        let snapshot = cache(&["a.jpg"]);
        let filtered = snapshot
            .apply_filter(&criteria(&["JPG"]), true)
            .expect("match despite criteria case");
        assert_eq!(filtered.names(), ["a.jpg"]);
    }

    #[test]
    fn empty_filter_result_is_an_error_not_an_empty_cache() {
        let snapshot = cache(&["a.jpg", "b.jpg"]);
        assert_eq!(
            snapshot
                .apply_filter(&criteria(&["png"]), true)
                .unwrap_err(),
            CacheError::EmptyResult
        );
        assert_eq!(
            snapshot
                .apply_filter(&criteria(&["jpg"]), false)
                .unwrap_err(),
            CacheError::EmptyResult
        );
    }

    #[test]
    fn filtering_returns_a_new_instance() {
        let snapshot = cache(&["a.jpg", "b.png"]);
        let _ = snapshot
            .apply_filter(&criteria(&["jpg"]), true)
            .expect("filtered child");
        // The parent is untouched.
        assert_eq!(snapshot.names(), ["a.jpg", "b.png"]);
    }
}
