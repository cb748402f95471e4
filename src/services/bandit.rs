/// Linear upper-confidence-bound (LinUCB) contextual bandit
///
/// Every arm keeps a ridge-regression model of its reward: a design matrix `A`
/// (starts at the identity) and a reward-weighted context sum `b` (starts at
/// zero). Scoring an arm for context `x` gives
///
/// ```text
/// theta = A^-1 b
/// p     = theta . x                    (predicted reward)
/// c     = alpha * sqrt(x^T A^-1 x)     (confidence width)
/// ucb   = p + c
/// ```
///
/// `A` only ever receives rank-1 positive-semidefinite additions, so it stays
/// symmetric positive-definite and the inverse always exists for well-formed
/// input. Observations are accumulated forever: there is no decay or window.
///
/// Arm statistics live in a sharded concurrent map. `update` holds the arm's
/// exclusive lock for the whole read-modify-write, so concurrent feedback on
/// the same arm cannot lose an observation, while different arms proceed in
/// parallel.
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{error::BanditError, models::MovieId};

/// Arms are movies
pub type ArmId = MovieId;

/// Per-arm ridge-regression statistics
#[derive(Debug, Clone, PartialEq)]
pub struct ArmStats {
    a: DMatrix<f64>,
    b: DVector<f64>,
    updates: u64,
}

impl ArmStats {
    fn new(dimension: usize) -> Self {
        Self {
            a: DMatrix::identity(dimension, dimension),
            b: DVector::zeros(dimension),
            updates: 0,
        }
    }

    /// Design matrix `A`
    pub fn design(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Reward-weighted context sum `b`
    pub fn rewards(&self) -> &DVector<f64> {
        &self.b
    }

    /// Number of observations folded into this arm
    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn inverse(&self) -> Result<DMatrix<f64>, BanditError> {
        self.a.clone().try_inverse().ok_or_else(|| {
            BanditError::Numerical("design matrix is not invertible".to_string())
        })
    }

    /// Weight vector `theta = A^-1 b`
    pub fn theta(&self) -> Result<DVector<f64>, BanditError> {
        Ok(self.inverse()? * &self.b)
    }

    fn estimate(&self, x: &DVector<f64>, alpha: f64) -> Result<(f64, f64), BanditError> {
        let a_inv = self.inverse()?;
        let theta = &a_inv * &self.b;
        let predicted = theta.dot(x);
        let variance = x.dot(&(&a_inv * x));

        if !variance.is_finite() || variance < 0.0 || !predicted.is_finite() {
            return Err(BanditError::Numerical(format!(
                "degenerate estimate (predicted={}, variance={})",
                predicted, variance
            )));
        }

        Ok((predicted, alpha * variance.sqrt()))
    }

    fn accumulate(&mut self, x: &DVector<f64>, reward: f64) {
        self.a += x * x.transpose();
        self.b += x * reward;
        self.updates += 1;
    }
}

/// Upper-confidence-bound score of one arm for one context
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmScore {
    pub arm: ArmId,
    pub predicted_reward: f64,
    pub confidence: f64,
    pub ucb: f64,
}

/// Serializable state of a single arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmSnapshot {
    pub arm: ArmId,
    /// `A` in column-major order
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub updates: u64,
}

/// Point-in-time copy of every arm's statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanditSnapshot {
    pub dimension: usize,
    pub alpha: f64,
    pub taken_at: DateTime<Utc>,
    pub arms: Vec<ArmSnapshot>,
}

/// LinUCB bandit over a fixed, preloaded arm universe
pub struct LinUcb {
    dimension: usize,
    alpha: f64,
    arms: DashMap<ArmId, ArmStats>,
}

impl std::fmt::Debug for LinUcb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinUcb")
            .field("dimension", &self.dimension)
            .field("alpha", &self.alpha)
            .field("arms", &self.arms.len())
            .finish()
    }
}

impl LinUcb {
    /// Creates a bandit with every arm initialised to `A = I`, `b = 0`
    pub fn new(
        arms: impl IntoIterator<Item = ArmId>,
        dimension: usize,
        alpha: f64,
    ) -> Result<Self, BanditError> {
        if dimension == 0 {
            return Err(BanditError::InvalidArgument(
                "context dimension must be positive".to_string(),
            ));
        }
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(BanditError::InvalidArgument(format!(
                "exploration coefficient must be positive, got {}",
                alpha
            )));
        }

        let arms: DashMap<ArmId, ArmStats> = arms
            .into_iter()
            .map(|arm| (arm, ArmStats::new(dimension)))
            .collect();

        tracing::info!(
            arms = arms.len(),
            dimension,
            alpha,
            "Initialised LinUCB bandit"
        );

        Ok(Self {
            dimension,
            alpha,
            arms,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn arm_count(&self) -> usize {
        self.arms.len()
    }

    pub fn contains(&self, arm: ArmId) -> bool {
        self.arms.contains_key(&arm)
    }

    /// Copy of one arm's statistics
    pub fn stats(&self, arm: ArmId) -> Option<ArmStats> {
        self.arms.get(&arm).map(|stats| stats.clone())
    }

    /// Picks the candidate with the highest upper confidence bound
    ///
    /// Ties go to the candidate that appears first in `candidates`. A single
    /// candidate is returned as-is once the inputs are validated. Reads only.
    pub fn select(&self, context: &[f64], candidates: &[ArmId]) -> Result<ArmId, BanditError> {
        let x = self.context_vector(context)?;
        let first = *candidates.first().ok_or_else(|| {
            BanditError::InvalidArgument("candidate set is empty".to_string())
        })?;
        self.ensure_known(candidates)?;

        if candidates.len() == 1 {
            return Ok(first);
        }

        let mut best: Option<ArmScore> = None;
        for &arm in candidates {
            let score = self.score_vector(&x, arm)?;
            match best {
                Some(current) if score.ucb <= current.ucb => {}
                _ => best = Some(score),
            }
        }

        let chosen = best.map(|score| score.arm).unwrap_or(first);
        tracing::trace!(arm = chosen, candidates = candidates.len(), "Selected arm");
        Ok(chosen)
    }

    /// Selects up to `k` distinct arms without replacement
    ///
    /// Produces the same sequence as calling [`LinUcb::select`] `k` times and
    /// removing each winner from the pool before the next call. Duplicate
    /// candidates are collapsed to their first occurrence.
    pub fn rank(
        &self,
        context: &[f64],
        candidates: &[ArmId],
        k: usize,
    ) -> Result<Vec<ArmScore>, BanditError> {
        let x = self.context_vector(context)?;
        if candidates.is_empty() {
            return Err(BanditError::InvalidArgument(
                "candidate set is empty".to_string(),
            ));
        }
        self.ensure_known(candidates)?;

        let mut seen = HashSet::new();
        let mut scores = Vec::with_capacity(candidates.len());
        for &arm in candidates {
            if seen.insert(arm) {
                scores.push(self.score_vector(&x, arm)?);
            }
        }

        // Stable sort keeps first-encountered order among equal bounds
        scores.sort_by(|a, b| {
            b.ucb
                .partial_cmp(&a.ucb)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scores.truncate(k);

        Ok(scores)
    }

    /// Scores a single arm without selecting it
    pub fn score(&self, context: &[f64], arm: ArmId) -> Result<ArmScore, BanditError> {
        let x = self.context_vector(context)?;
        self.score_vector(&x, arm)
    }

    /// Folds an observed reward into the arm's statistics
    ///
    /// `A += x x^T`, `b += reward * x`.
    pub fn update(&self, arm: ArmId, context: &[f64], reward: f64) -> Result<(), BanditError> {
        let x = self.context_vector(context)?;
        if !reward.is_finite() {
            return Err(BanditError::InvalidArgument(format!(
                "reward must be finite, got {}",
                reward
            )));
        }

        let mut stats = self
            .arms
            .get_mut(&arm)
            .ok_or_else(|| BanditError::InvalidArgument(format!("unknown arm {}", arm)))?;
        stats.accumulate(&x, reward);

        tracing::debug!(arm, reward, updates = stats.updates, "Updated arm");
        Ok(())
    }

    /// Copies the statistics of every arm, ordered by arm id
    pub fn snapshot(&self) -> BanditSnapshot {
        let mut arms: Vec<ArmSnapshot> = self
            .arms
            .iter()
            .map(|entry| ArmSnapshot {
                arm: *entry.key(),
                a: entry.value().a.as_slice().to_vec(),
                b: entry.value().b.as_slice().to_vec(),
                updates: entry.value().updates,
            })
            .collect();
        arms.sort_by_key(|arm| arm.arm);

        BanditSnapshot {
            dimension: self.dimension,
            alpha: self.alpha,
            taken_at: Utc::now(),
            arms,
        }
    }

    /// Loads arm statistics from a snapshot
    ///
    /// The snapshot must share this bandit's dimension. Arms outside the
    /// current universe are skipped; arms absent from the snapshot keep their
    /// current state. Returns the number of arms restored. Nothing is written
    /// unless every arm in the snapshot is well-formed.
    pub fn restore(&self, snapshot: &BanditSnapshot) -> Result<usize, BanditError> {
        if snapshot.dimension != self.dimension {
            return Err(BanditError::InvalidArgument(format!(
                "snapshot dimension {} does not match bandit dimension {}",
                snapshot.dimension, self.dimension
            )));
        }

        let d = self.dimension;
        let mut restored = Vec::new();
        for arm in &snapshot.arms {
            if arm.a.len() != d * d || arm.b.len() != d {
                return Err(BanditError::InvalidArgument(format!(
                    "arm {} has malformed statistics",
                    arm.arm
                )));
            }
            if !self.contains(arm.arm) {
                continue;
            }

            if arm.a.iter().chain(&arm.b).any(|value| !value.is_finite()) {
                return Err(BanditError::InvalidArgument(format!(
                    "arm {} has non-finite statistics",
                    arm.arm
                )));
            }

            let a = DMatrix::from_vec(d, d, arm.a.clone());
            // Cholesky only reads the lower triangle, so symmetry is checked first
            if !is_symmetric(&a) || a.clone().cholesky().is_none() {
                return Err(BanditError::InvalidArgument(format!(
                    "arm {} design matrix is not symmetric positive-definite",
                    arm.arm
                )));
            }

            restored.push((
                arm.arm,
                ArmStats {
                    a,
                    b: DVector::from_vec(arm.b.clone()),
                    updates: arm.updates,
                },
            ));
        }

        let count = restored.len();
        for (arm, stats) in restored {
            self.arms.insert(arm, stats);
        }

        let skipped = snapshot.arms.len() - count;
        if skipped > 0 {
            tracing::warn!(skipped, "Snapshot contained arms outside the current universe");
        }

        Ok(count)
    }

    fn context_vector(&self, context: &[f64]) -> Result<DVector<f64>, BanditError> {
        if context.len() != self.dimension {
            return Err(BanditError::InvalidArgument(format!(
                "context has dimension {}, expected {}",
                context.len(),
                self.dimension
            )));
        }
        if context.iter().any(|value| !value.is_finite()) {
            return Err(BanditError::InvalidArgument(
                "context contains non-finite values".to_string(),
            ));
        }
        Ok(DVector::from_column_slice(context))
    }

    fn ensure_known(&self, candidates: &[ArmId]) -> Result<(), BanditError> {
        match candidates.iter().find(|arm| !self.contains(**arm)) {
            Some(arm) => Err(BanditError::InvalidArgument(format!("unknown arm {}", arm))),
            None => Ok(()),
        }
    }

    fn score_vector(&self, x: &DVector<f64>, arm: ArmId) -> Result<ArmScore, BanditError> {
        let stats = self
            .arms
            .get(&arm)
            .ok_or_else(|| BanditError::InvalidArgument(format!("unknown arm {}", arm)))?;
        let (predicted_reward, confidence) = stats.estimate(x, self.alpha)?;

        Ok(ArmScore {
            arm,
            predicted_reward,
            confidence,
            ucb: predicted_reward + confidence,
        })
    }
}

/// Relative tolerance when comparing mirrored entries of a restored `A`
const SYMMETRY_TOLERANCE: f64 = 1e-9;

fn is_symmetric(a: &DMatrix<f64>) -> bool {
    let n = a.nrows();
    (0..n).all(|i| {
        (0..i).all(|j| {
            let (upper, lower) = (a[(j, i)], a[(i, j)]);
            (upper - lower).abs() <= SYMMETRY_TOLERANCE * upper.abs().max(lower.abs()).max(1.0)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn bandit(arms: std::ops::RangeInclusive<ArmId>, dimension: usize) -> LinUcb {
        LinUcb::new(arms, dimension, 0.1).unwrap()
    }

    #[test]
    fn test_new_preloads_identity_and_zero() {
        let bandit = bandit(1..=3, 2);
        assert_eq!(bandit.arm_count(), 3);

        let stats = bandit.stats(2).unwrap();
        assert_eq!(stats.design(), &DMatrix::<f64>::identity(2, 2));
        assert_eq!(stats.rewards(), &DVector::<f64>::zeros(2));
        assert_eq!(stats.updates(), 0);
    }

    #[test]
    fn test_new_rejects_bad_parameters() {
        assert!(matches!(
            LinUcb::new(1..=2, 0, 0.1),
            Err(BanditError::InvalidArgument(_))
        ));
        assert!(matches!(
            LinUcb::new(1..=2, 2, 0.0),
            Err(BanditError::InvalidArgument(_))
        ));
        assert!(matches!(
            LinUcb::new(1..=2, 2, f64::NAN),
            Err(BanditError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unvisited_arms_tie_break_to_first_candidate() {
        let bandit = bandit(1..=5, 3);
        let context = [0.3, 0.4, 0.5];

        assert_eq!(bandit.select(&context, &[4, 2, 5]).unwrap(), 4);
        assert_eq!(bandit.select(&context, &[2, 4, 5]).unwrap(), 2);
    }

    #[test]
    fn test_unvisited_confidence_is_alpha_times_norm() {
        let bandit = bandit(1..=1, 2);
        let score = bandit.score(&[3.0, 4.0], 1).unwrap();

        assert_eq!(score.predicted_reward, 0.0);
        assert!((score.confidence - 0.5).abs() < 1e-12);
        assert_eq!(score.ucb, score.predicted_reward + score.confidence);
    }

    #[test]
    fn test_select_is_pure() {
        let bandit = bandit(1..=4, 2);
        bandit.update(3, &[1.0, 0.5], 2.0).unwrap();
        bandit.update(1, &[0.2, 1.0], 1.0).unwrap();

        let context = [0.7, 0.3];
        let candidates = [1, 2, 3, 4];
        let first = bandit.select(&context, &candidates).unwrap();
        for _ in 0..5 {
            assert_eq!(bandit.select(&context, &candidates).unwrap(), first);
        }
        assert_eq!(bandit.stats(3).unwrap().updates(), 1);
    }

    #[test]
    fn test_positive_reward_raises_prediction() {
        let bandit = bandit(1..=2, 4);
        let context = [0.5, 1.0, 0.0, 0.25];

        let before = bandit.score(&context, 1).unwrap().predicted_reward;
        bandit.update(1, &context, 1.0).unwrap();
        let after = bandit.score(&context, 1).unwrap().predicted_reward;

        assert!(after > before);
        // The rewarded arm now beats the untouched one
        assert_eq!(bandit.select(&context, &[2, 1]).unwrap(), 1);
    }

    #[test]
    fn test_single_candidate_is_returned() {
        let bandit = bandit(1..=3, 2);
        bandit.update(1, &[1.0, 0.0], 3.0).unwrap();

        assert_eq!(bandit.select(&[1.0, 0.0], &[2]).unwrap(), 2);
    }

    #[test]
    fn test_two_updates_differ_from_one_double_reward_update() {
        let twice = bandit(1..=1, 2);
        twice.update(1, &[1.0, 0.0], 1.0).unwrap();
        twice.update(1, &[1.0, 0.0], 1.0).unwrap();

        let doubled = bandit(1..=1, 2);
        doubled.update(1, &[1.0, 0.0], 2.0).unwrap();

        let theta_twice = twice.stats(1).unwrap().theta().unwrap();
        let theta_doubled = doubled.stats(1).unwrap().theta().unwrap();

        // A = diag(3, 1), b = [2, 0] versus A = diag(2, 1), b = [2, 0]
        assert!((theta_twice[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((theta_doubled[0] - 1.0).abs() < 1e-12);
        assert_ne!(theta_twice, theta_doubled);
        assert_ne!(
            twice.stats(1).unwrap().design(),
            doubled.stats(1).unwrap().design()
        );
    }

    #[test]
    fn test_single_update_literal_values() {
        let bandit = bandit(1..=1, 2);
        bandit.update(1, &[1.0, 0.0], 1.0).unwrap();

        let stats = bandit.stats(1).unwrap();
        assert_eq!(stats.design(), &DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]));
        assert_eq!(stats.rewards(), &DVector::from_vec(vec![1.0, 0.0]));
        assert_eq!(stats.theta().unwrap(), DVector::from_vec(vec![0.5, 0.0]));

        assert_eq!(bandit.select(&[1.0, 0.0], &[1]).unwrap(), 1);
        assert_eq!(bandit.score(&[1.0, 0.0], 1).unwrap().predicted_reward, 0.5);
    }

    #[test]
    fn test_accumulation_never_decays() {
        let bandit = bandit(1..=1, 1);
        for _ in 0..100 {
            bandit.update(1, &[1.0], 0.0).unwrap();
        }
        bandit.update(1, &[1.0], 1.0).unwrap();

        // b = 1, A = 102: the first hundred zero rewards still weigh in
        let theta = bandit.stats(1).unwrap().theta().unwrap();
        assert!((theta[0] - 1.0 / 102.0).abs() < 1e-12);
    }

    #[test]
    fn test_design_matrix_stays_symmetric_positive_definite() {
        let bandit = bandit(1..=1, 3);
        let contexts = [[1.0, 2.0, 0.0], [0.0, -1.0, 3.0], [0.5, 0.5, 0.5]];
        for (i, context) in contexts.iter().enumerate() {
            bandit.update(1, context, i as f64).unwrap();
        }

        let a = bandit.stats(1).unwrap().design().clone();
        assert_eq!(a, a.transpose());
        assert!(a.cholesky().is_some());
    }

    #[test]
    fn test_empty_candidates_is_invalid_argument() {
        let bandit = bandit(1..=2, 2);
        assert!(matches!(
            bandit.select(&[1.0, 0.0], &[]),
            Err(BanditError::InvalidArgument(_))
        ));
        assert!(matches!(
            bandit.rank(&[1.0, 0.0], &[], 3),
            Err(BanditError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_invalid_argument() {
        let bandit = bandit(1..=2, 2);
        assert!(matches!(
            bandit.select(&[1.0, 0.0, 0.0], &[1, 2]),
            Err(BanditError::InvalidArgument(_))
        ));
        assert!(matches!(
            bandit.update(1, &[1.0], 1.0),
            Err(BanditError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unknown_arm_is_invalid_argument() {
        let bandit = bandit(1..=2, 2);
        assert!(matches!(
            bandit.update(9, &[1.0, 0.0], 1.0),
            Err(BanditError::InvalidArgument(_))
        ));
        assert!(matches!(
            bandit.select(&[1.0, 0.0], &[1, 9]),
            Err(BanditError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_non_finite_inputs_are_rejected() {
        let bandit = bandit(1..=2, 2);
        assert!(bandit.select(&[f64::NAN, 0.0], &[1, 2]).is_err());
        assert!(bandit.update(1, &[1.0, 0.0], f64::INFINITY).is_err());
        assert_eq!(bandit.stats(1).unwrap().updates(), 0);
    }

    #[test]
    fn test_rank_matches_repeated_select_without_replacement() {
        let bandit = bandit(1..=6, 3);
        bandit.update(2, &[1.0, 0.0, 0.0], 2.0).unwrap();
        bandit.update(5, &[0.0, 1.0, 0.0], 3.0).unwrap();
        bandit.update(6, &[1.0, 1.0, 0.0], 1.0).unwrap();

        let context = [0.6, 0.8, 0.1];
        let mut pool = vec![1, 2, 3, 4, 5, 6];
        let mut expected = Vec::new();
        for _ in 0..4 {
            let arm = bandit.select(&context, &pool).unwrap();
            pool.retain(|candidate| *candidate != arm);
            expected.push(arm);
        }

        let ranked: Vec<ArmId> = bandit
            .rank(&context, &[1, 2, 3, 4, 5, 6], 4)
            .unwrap()
            .iter()
            .map(|score| score.arm)
            .collect();
        assert_eq!(ranked, expected);
    }

    #[test]
    fn test_rank_caps_at_pool_size_and_collapses_duplicates() {
        let bandit = bandit(1..=3, 2);
        let ranked = bandit.rank(&[1.0, 1.0], &[3, 1, 3], 10).unwrap();
        let arms: Vec<ArmId> = ranked.iter().map(|score| score.arm).collect();
        assert_eq!(arms, vec![3, 1]);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let source = bandit(1..=3, 2);
        source.update(1, &[1.0, 0.0], 1.0).unwrap();
        source.update(3, &[0.5, 0.5], 2.0).unwrap();
        let snapshot = source.snapshot();
        assert_eq!(
            snapshot.arms.iter().map(|arm| arm.arm).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let target = bandit(1..=3, 2);
        assert_eq!(target.restore(&snapshot).unwrap(), 3);
        for arm in 1..=3 {
            assert_eq!(target.stats(arm), source.stats(arm));
        }
    }

    #[test]
    fn test_restore_skips_unknown_arms_and_rejects_wrong_dimension() {
        let source = bandit(1..=4, 2);
        source.update(4, &[1.0, 0.0], 1.0).unwrap();
        let snapshot = source.snapshot();

        let smaller = bandit(1..=2, 2);
        assert_eq!(smaller.restore(&snapshot).unwrap(), 2);
        assert!(!smaller.contains(4));

        let wider = bandit(1..=4, 3);
        assert!(matches!(
            wider.restore(&snapshot),
            Err(BanditError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_restore_rejects_non_positive_definite_matrix() {
        let target = bandit(1..=1, 2);
        let snapshot = BanditSnapshot {
            dimension: 2,
            alpha: 0.1,
            taken_at: Utc::now(),
            arms: vec![ArmSnapshot {
                arm: 1,
                a: vec![0.0, 0.0, 0.0, 0.0],
                b: vec![0.0, 0.0],
                updates: 1,
            }],
        };

        assert!(target.restore(&snapshot).is_err());
        assert_eq!(target.stats(1).unwrap().updates(), 0);
    }

    fn single_arm_snapshot(a: Vec<f64>, b: Vec<f64>) -> BanditSnapshot {
        BanditSnapshot {
            dimension: 2,
            alpha: 0.1,
            taken_at: Utc::now(),
            arms: vec![ArmSnapshot {
                arm: 1,
                a,
                b,
                updates: 1,
            }],
        }
    }

    #[test]
    fn test_restore_rejects_asymmetric_matrix() {
        let target = bandit(1..=1, 2);
        // Lower triangle alone is positive-definite; the upper entry breaks symmetry
        let snapshot = single_arm_snapshot(vec![2.0, 0.0, 5.0, 2.0], vec![0.0, 0.0]);

        assert!(matches!(
            target.restore(&snapshot),
            Err(BanditError::InvalidArgument(_))
        ));
        assert_eq!(target.stats(1).unwrap().updates(), 0);
    }

    #[test]
    fn test_restore_rejects_non_finite_statistics() {
        let target = bandit(1..=1, 2);

        let bad_b = single_arm_snapshot(vec![2.0, 0.0, 0.0, 2.0], vec![f64::NAN, 0.0]);
        assert!(target.restore(&bad_b).is_err());

        let bad_a = single_arm_snapshot(vec![2.0, 0.0, 0.0, f64::INFINITY], vec![0.0, 0.0]);
        assert!(target.restore(&bad_a).is_err());

        assert_eq!(target.stats(1).unwrap().updates(), 0);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let bandit = Arc::new(bandit(1..=2, 2));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bandit = Arc::clone(&bandit);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        bandit.update(1, &[1.0, 0.0], 1.0).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = bandit.stats(1).unwrap();
        assert_eq!(stats.updates(), 400);
        assert_eq!(stats.design()[(0, 0)], 401.0);
        assert_eq!(stats.rewards()[0], 400.0);
    }
}
