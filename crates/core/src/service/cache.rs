//! Process-wide prediction cache
//!
//! Holds at most one [`PredictionSnapshot`] behind an `Arc`. Writers build the
//! next snapshot completely and then swap the pointer; the lock is held only
//! for that swap, so readers are never blocked by a running interpolation and
//! never see horizons from two different cycles.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core_types::PredictionSnapshot;
use crate::error::CacheNotReady;

#[derive(Debug, Default)]
pub struct PredictionCache {
    current: RwLock<Option<Arc<PredictionSnapshot>>>,
}

impl PredictionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, or [`CacheNotReady`] before the first successful
    /// cycle.
    pub fn get(&self) -> Result<Arc<PredictionSnapshot>, CacheNotReady> {
        self.current.read().clone().ok_or(CacheNotReady)
    }

    /// Replace the visible snapshot in one step. Only the refresh pipeline
    /// publishes.
    ///
    /// # Returns
    ///
    /// The snapshot that was replaced, if any
    pub(crate) fn set(&self, snapshot: Arc<PredictionSnapshot>) -> Option<Arc<PredictionSnapshot>> {
        self.current.write().replace(snapshot)
    }

    pub fn is_ready(&self) -> bool {
        self.get().is_ok()
    }

    /// Generation of the visible snapshot.
    pub fn generation(&self) -> Option<u64> {
        self.get().ok().map(|s| s.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Horizon, InterpolatedSurface, SurfacePoint};
    use crate::kriging::FitSummary;
    use chrono::Utc;

    fn snapshot(generation: u64) -> Arc<PredictionSnapshot> {
        Arc::new(PredictionSnapshot::new(Utc::now(), generation, Vec::<InterpolatedSurface>::new()))
    }

    /// Every point of every horizon carries the generation as its value.
    fn stamped_snapshot(generation: u64) -> Arc<PredictionSnapshot> {
        let value = generation as f64;
        Arc::new(PredictionSnapshot::new(
            Utc::now(),
            generation,
            Horizon::ALL.map(|horizon| InterpolatedSurface {
                horizon,
                points: vec![SurfacePoint::new(35.68, 139.75, value); 64],
                fit: FitSummary::default(),
            }),
        ))
    }

    #[test]
    fn test_not_ready_until_first_set() {
        let cache = PredictionCache::new();
        assert_eq!(cache.get().unwrap_err(), CacheNotReady);
        assert!(!cache.is_ready());
        assert_eq!(cache.generation(), None);
    }

    #[test]
    fn test_set_replaces_whole_snapshot() {
        let cache = PredictionCache::new();
        assert!(cache.set(snapshot(1)).is_none());

        let held = cache.get().unwrap();
        let previous = cache.set(snapshot(2)).unwrap();
        assert_eq!(previous.generation, 1);
        assert_eq!(cache.generation(), Some(2));

        // Readers holding the old Arc keep a valid snapshot
        assert_eq!(held.generation, 1);
    }

    #[test]
    fn test_readers_never_see_mixed_snapshots() {
        let cache = PredictionCache::new();
        cache.set(stamped_snapshot(0));

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..2_000 {
                        let snap = cache.get().unwrap();
                        let expected = snap.generation as f64;
                        assert!(snap
                            .surfaces
                            .values()
                            .flat_map(|surface| &surface.points)
                            .all(|p| p.value == expected));
                    }
                });
            }
            s.spawn(|| {
                for generation in 1..=500 {
                    cache.set(stamped_snapshot(generation));
                }
            });
        });

        assert_eq!(cache.generation(), Some(500));
    }
}
