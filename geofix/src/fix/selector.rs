//! Best-fix selection.
//!
//! Folds an overlapping stream of samples into the single most accurate one.
//! Not thread-safe on its own; the acquisition engine serializes updates
//! through its control task.

use super::model::Fix;

/// Pure fold step.
///
/// Returns `sample` if nothing is held or `sample` is strictly more accurate
/// than `current`; otherwise returns `current`. Ties keep `current`.
pub fn update(current: Option<&Fix>, sample: Fix) -> Fix {
    match current {
        Some(held) if !sample.is_better_than(held) => *held,
        _ => sample,
    }
}

/// Running "best so far" state for one acquisition.
#[derive(Debug, Default, Clone)]
pub struct BestFixSelector {
    best: Option<Fix>,
    samples: usize,
}

impl BestFixSelector {
    /// Create an empty selector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a sample. Returns true if it became the new best.
    pub fn offer(&mut self, sample: Fix) -> bool {
        self.samples += 1;
        let next = update(self.best.as_ref(), sample);
        let changed = self.best != Some(next);
        self.best = Some(next);
        changed
    }

    /// The most accurate fix seen so far.
    pub fn best(&self) -> Option<&Fix> {
        self.best.as_ref()
    }

    /// Number of samples offered, including ones that did not improve `best`.
    pub fn sample_count(&self) -> usize {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn fix(accuracy: f64) -> Fix {
        Fix::new(45.0, 7.0, accuracy).unwrap()
    }

    #[test]
    fn test_update_takes_sample_when_empty() {
        let sample = fix(40.0);
        assert_eq!(update(None, sample), sample);
    }

    #[test]
    fn test_update_prefers_lower_accuracy() {
        let held = fix(40.0);
        let better = fix(10.0);
        assert_eq!(update(Some(&held), better), better);
    }

    #[test]
    fn test_update_keeps_held_on_worse_sample() {
        let held = fix(10.0);
        assert_eq!(update(Some(&held), fix(40.0)), held);
    }

    #[test]
    fn test_update_tie_keeps_held() {
        let now = Utc::now();
        let held = Fix::at(45.0, 7.0, 10.0, now).unwrap();
        let newer = Fix::at(45.1, 7.1, 10.0, now + Duration::seconds(1)).unwrap();
        assert_eq!(update(Some(&held), newer), held);
    }

    #[test]
    fn test_selector_tracks_best_and_count() {
        let mut selector = BestFixSelector::new();
        assert!(selector.best().is_none());

        assert!(selector.offer(fix(50.0)));
        assert!(selector.offer(fix(30.0)));
        assert!(!selector.offer(fix(45.0)));
        assert!(selector.offer(fix(15.0)));

        assert_eq!(selector.best().unwrap().accuracy_m(), 15.0);
        assert_eq!(selector.sample_count(), 4);
    }

    #[test]
    fn test_missing_accuracy_never_replaces_real_fix() {
        let mut selector = BestFixSelector::new();
        selector.offer(fix(500.0));
        let unknown = Fix::from_reading(45.0, 7.0, None, Utc::now()).unwrap();
        assert!(!selector.offer(unknown));
        assert_eq!(selector.best().unwrap().accuracy_m(), 500.0);
    }

    proptest! {
        /// Best accuracy never increases, whatever order samples arrive in.
        #[test]
        fn prop_best_accuracy_is_monotone(
            accuracies in proptest::collection::vec(0.0f64..10_000.0f64, 1..64)
        ) {
            let mut selector = BestFixSelector::new();
            let mut previous = f64::INFINITY;

            for accuracy in accuracies {
                selector.offer(fix(accuracy));
                let best = selector.best().unwrap().accuracy_m();
                prop_assert!(best <= previous);
                prop_assert!(best <= accuracy);
                previous = best;
            }
        }
    }
}
