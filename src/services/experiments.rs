/// Deterministic A/B bucketing
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::models::{UserId, Variant};

/// Experiment deciding whether the bandit re-ranks a user's recommendations
pub const BANDIT_EXPERIMENT: &str = "linucb_reranking";

/// Resolution of the bucket position in [0, 1)
const BUCKETS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbTesting {
    split: f64,
}

impl AbTesting {
    /// `split` is the fraction of users placed in treatment, clamped to [0, 1]
    pub fn new(split: f64) -> Self {
        Self {
            split: split.clamp(0.0, 1.0),
        }
    }

    pub fn split(&self) -> f64 {
        self.split
    }

    /// Stable position of `user_id` within `experiment`, in [0, 1)
    pub fn bucket(experiment: &str, user_id: UserId) -> f64 {
        let mut hasher = DefaultHasher::new();
        experiment.hash(&mut hasher);
        user_id.hash(&mut hasher);
        (hasher.finish() % BUCKETS) as f64 / BUCKETS as f64
    }

    /// Treatment when the user's bucket falls below the split
    pub fn assign(&self, user_id: UserId, experiment: &str) -> Variant {
        if Self::bucket(experiment, user_id) < self.split {
            Variant::Treatment
        } else {
            Variant::Control
        }
    }
}
