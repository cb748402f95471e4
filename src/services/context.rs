/// Context vector construction
///
/// Turns the free-form request context into the fixed-dimension feature
/// vector the bandit scores against. Layout for dimension `d`:
///
/// | index      | feature                                     |
/// |------------|---------------------------------------------|
/// | 0          | bias, always 1.0                            |
/// | 1..5       | time of day: morning, afternoon, evening, night |
/// | 5..9       | device: mobile, desktop, tv, tablet         |
/// | 9..d       | user bucket: `user_id mod (d - 9)`          |
///
/// Unknown or missing values leave their block at zero, so the same request
/// always maps to the same vector.
use crate::{
    config::MIN_CONTEXT_DIM,
    error::BanditError,
    models::{ContextMap, UserId},
};

const BIAS: usize = 0;
const TIME_OFFSET: usize = 1;
const DEVICE_OFFSET: usize = 5;
const USER_OFFSET: usize = 9;

const TIMES: [&str; 4] = ["morning", "afternoon", "evening", "night"];
const DEVICES: [&str; 4] = ["mobile", "desktop", "tv", "tablet"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    dimension: usize,
}

impl ContextBuilder {
    pub fn new(dimension: usize) -> Result<Self, BanditError> {
        if dimension < MIN_CONTEXT_DIM {
            return Err(BanditError::InvalidArgument(format!(
                "context dimension must be at least {}, got {}",
                MIN_CONTEXT_DIM, dimension
            )));
        }
        Ok(Self { dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Builds the feature vector for `user_id` in `context`
    pub fn build(&self, user_id: UserId, context: &ContextMap) -> Vec<f64> {
        let mut features = vec![0.0; self.dimension];
        features[BIAS] = 1.0;

        if let Some(slot) = lookup(context, "time", &TIMES) {
            features[TIME_OFFSET + slot] = 1.0;
        }
        if let Some(slot) = lookup(context, "device", &DEVICES) {
            features[DEVICE_OFFSET + slot] = 1.0;
        }

        let buckets = (self.dimension - USER_OFFSET) as i64;
        let bucket = user_id.rem_euclid(buckets) as usize;
        features[USER_OFFSET + bucket] = 1.0;

        features
    }
}

fn lookup(context: &ContextMap, key: &str, values: &[&str]) -> Option<usize> {
    let value = context.get(key)?.trim().to_lowercase();
    values.iter().position(|candidate| *candidate == value)
}
