/// Hybrid recommendation pipeline
///
/// Every enabled scorer proposes its top `2n` movies. Proposals are merged by
/// weighted sum, the best `3n` form the candidate pool, and the final `n` are
/// either the head of that pool or, when the bandit is active for the request,
/// the bandit's picks from it.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

use super::{
    bandit::{ArmScore, LinUcb},
    context::ContextBuilder,
    experiments::{AbTesting, BANDIT_EXPERIMENT},
};
use crate::{
    config::FeatureFlags,
    db::{Cache, CacheKey, Repository},
    error::{AppError, AppResult, BanditError},
    models::{
        ContextMap, FeedbackRequest, Interaction, MovieId, MovieSummary, NewAssignment,
        NewInteraction, Recommendation, RecommendationRequest, RecommendationResponse,
        RecommendationSource, UserId, Variant,
    },
};

/// Upper bound on `num_recommendations`
pub const MAX_RECOMMENDATIONS: usize = 100;

/// Ids the placeholder scorers draw from
const PLACEHOLDER_MOVIES: std::ops::RangeInclusive<MovieId> = 1..=100;

const MODEL_VERSION: &str = "linucb-v1";

/// Source of a candidate list, fixing its weight in the merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScorerKind {
    Ncf,
    Gnn,
    Sequential,
    Popularity,
}

impl ScorerKind {
    pub fn weight(self) -> f64 {
        match self {
            ScorerKind::Ncf => 0.3,
            ScorerKind::Gnn => 0.3,
            ScorerKind::Sequential => 0.2,
            ScorerKind::Popularity => 0.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScorerKind::Ncf => "ncf",
            ScorerKind::Gnn => "gnn",
            ScorerKind::Sequential => "sequential",
            ScorerKind::Popularity => "popularity",
        }
    }
}

/// Proposes scored candidates for a user
#[async_trait::async_trait]
pub trait CandidateScorer: Send + Sync {
    fn kind(&self) -> ScorerKind;

    /// At most `k` `(movie, score)` pairs, best first
    async fn top(&self, user_id: UserId, k: usize) -> AppResult<Vec<(MovieId, f64)>>;
}

/// Uniform random scores, standing in for a model that has not been trained
pub struct RandomScorer {
    kind: ScorerKind,
    rng: Mutex<StdRng>,
}

impl RandomScorer {
    pub fn new(kind: ScorerKind, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            kind,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait::async_trait]
impl CandidateScorer for RandomScorer {
    fn kind(&self) -> ScorerKind {
        self.kind
    }

    async fn top(&self, _user_id: UserId, k: usize) -> AppResult<Vec<(MovieId, f64)>> {
        let mut scored: Vec<(MovieId, f64)> = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            PLACEHOLDER_MOVIES.map(|id| (id, rng.gen::<f64>())).collect()
        };
        sort_best_first(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }
}

/// Ranks reviewed movies by sentiment; the list is cached when Redis is on
pub struct PopularityScorer {
    repository: Arc<dyn Repository>,
    cache: Option<Cache>,
    ttl: u64,
}

impl PopularityScorer {
    pub fn new(repository: Arc<dyn Repository>, cache: Option<Cache>, ttl: u64) -> Self {
        Self {
            repository,
            cache,
            ttl,
        }
    }

    async fn cached_popular(&self, cache: &Cache, limit: usize) -> AppResult<Vec<MovieId>> {
        crate::cached!(
            cache,
            CacheKey::Popular(limit),
            self.ttl,
            self.repository.popular_movies(limit)
        )
    }

    async fn popular(&self, limit: usize) -> AppResult<Vec<MovieId>> {
        let Some(cache) = &self.cache else {
            return self.repository.popular_movies(limit).await;
        };

        match self.cached_popular(cache, limit).await {
            Err(AppError::Cache(e)) => {
                tracing::warn!(error = %e, "Popularity cache unavailable, reading store");
                self.repository.popular_movies(limit).await
            }
            result => result,
        }
    }
}

#[async_trait::async_trait]
impl CandidateScorer for PopularityScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Popularity
    }

    async fn top(&self, _user_id: UserId, k: usize) -> AppResult<Vec<(MovieId, f64)>> {
        let ids = self.popular(k).await?;
        let len = ids.len() as f64;
        Ok(ids
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, id)| (id, 1.0 - rank as f64 / len))
            .collect())
    }
}

/// Scorers enabled by `flags`; popularity is always present
pub fn build_scorers(
    flags: &FeatureFlags,
    seed: Option<u64>,
    repository: Arc<dyn Repository>,
    cache: Option<Cache>,
    cache_ttl: u64,
) -> Vec<Box<dyn CandidateScorer>> {
    let mut scorers: Vec<Box<dyn CandidateScorer>> = Vec::new();
    let placeholders = [
        (ScorerKind::Ncf, flags.enable_ncf),
        (ScorerKind::Gnn, flags.enable_gnn),
        (ScorerKind::Sequential, flags.enable_sequential),
    ];
    // Distinct streams per scorer when seeded
    for (offset, (kind, enabled)) in placeholders.into_iter().enumerate() {
        if enabled {
            let seed = seed.map(|seed| seed.wrapping_add(offset as u64));
            scorers.push(Box::new(RandomScorer::new(kind, seed)));
        }
    }
    scorers.push(Box::new(PopularityScorer::new(repository, cache, cache_ttl)));
    scorers
}

#[derive(Debug, Clone, Copy)]
struct Pick {
    movie_id: MovieId,
    score: f64,
    bandit: Option<ArmScore>,
}

/// Merges scorer output and optionally re-ranks it with the bandit
pub struct Recommender {
    scorers: Vec<Box<dyn CandidateScorer>>,
    repository: Arc<dyn Repository>,
    contexts: ContextBuilder,
    bandit: Option<Arc<LinUcb>>,
    ab_testing: Option<AbTesting>,
}

impl Recommender {
    pub fn new(
        scorers: Vec<Box<dyn CandidateScorer>>,
        repository: Arc<dyn Repository>,
        contexts: ContextBuilder,
    ) -> Self {
        Self {
            scorers,
            repository,
            contexts,
            bandit: None,
            ab_testing: None,
        }
    }

    /// Enables bandit re-ranking and feedback updates
    pub fn with_bandit(mut self, bandit: Arc<LinUcb>) -> Result<Self, BanditError> {
        if bandit.dimension() != self.contexts.dimension() {
            return Err(BanditError::InvalidArgument(format!(
                "bandit dimension {} does not match context dimension {}",
                bandit.dimension(),
                self.contexts.dimension()
            )));
        }
        self.bandit = Some(bandit);
        Ok(self)
    }

    /// Restricts bandit re-ranking to the treatment group
    pub fn with_ab_testing(mut self, ab_testing: AbTesting) -> Self {
        self.ab_testing = Some(ab_testing);
        self
    }

    pub fn bandit(&self) -> Option<&Arc<LinUcb>> {
        self.bandit.as_ref()
    }

    pub fn contexts(&self) -> &ContextBuilder {
        &self.contexts
    }

    pub fn scorer_kinds(&self) -> Vec<ScorerKind> {
        self.scorers.iter().map(|scorer| scorer.kind()).collect()
    }

    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> AppResult<RecommendationResponse> {
        let n = request.num_recommendations;
        if n == 0 || n > MAX_RECOMMENDATIONS {
            return Err(AppError::InvalidInput(format!(
                "num_recommendations must be between 1 and {}",
                MAX_RECOMMENDATIONS
            )));
        }

        let pool = self.candidate_pool(request.user_id, n).await?;

        // Only meaningful when there is a bandit to compare against
        let variant = match (&self.bandit, &self.ab_testing) {
            (Some(_), Some(ab)) => Some(ab.assign(request.user_id, BANDIT_EXPERIMENT)),
            _ => None,
        };

        let picks = match (&self.bandit, &request.context, variant) {
            (Some(bandit), Some(context), None | Some(Variant::Treatment)) => {
                self.bandit_picks(bandit, request.user_id, context, &pool, n)?
            }
            _ => weighted_picks(&pool, n),
        };

        let recommendations = self.hydrate(&picks).await?;

        if let Some(variant) = variant {
            self.record_exposure(request, variant, recommendations.len())
                .await;
        }

        tracing::info!(
            user_id = request.user_id,
            requested = n,
            pool = pool.len(),
            returned = recommendations.len(),
            variant = variant.map(Variant::as_str),
            "Served recommendations"
        );

        Ok(RecommendationResponse {
            user_id: request.user_id,
            variant,
            recommendations,
        })
    }

    /// Folds an observed outcome into the bandit and logs the interaction
    pub async fn feedback(&self, request: FeedbackRequest) -> AppResult<Interaction> {
        let reward = request
            .reward
            .unwrap_or_else(|| request.kind.default_reward());
        if !reward.is_finite() {
            return Err(AppError::InvalidInput("reward must be finite".to_string()));
        }
        if let Some(rate) = request.completion_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(AppError::InvalidInput(
                    "completion_rate must be within [0, 1]".to_string(),
                ));
            }
        }

        // Movies outside the arm universe can still be served by the weighted path
        let learner = self
            .bandit
            .as_ref()
            .filter(|bandit| bandit.contains(request.movie_id));
        if self.bandit.is_some() && learner.is_none() {
            tracing::debug!(
                movie_id = request.movie_id,
                "Feedback outside the arm universe, skipping bandit update"
            );
        }

        // Persist first so a failed write never leaves a learned reward behind
        let interaction = self
            .repository
            .record_interaction(NewInteraction {
                user_id: request.user_id,
                movie_id: request.movie_id,
                kind: request.kind,
                reward,
                watch_duration: request.watch_duration,
                completion_rate: request.completion_rate,
            })
            .await?;

        if let Some(bandit) = learner {
            let x = self.contexts.build(request.user_id, &request.context);
            bandit.update(request.movie_id, &x, reward)?;
        }

        tracing::info!(
            user_id = interaction.user_id,
            movie_id = interaction.movie_id,
            kind = %interaction.kind,
            reward,
            bandit_updated = learner.is_some(),
            "Recorded feedback"
        );

        Ok(interaction)
    }

    async fn candidate_pool(&self, user_id: UserId, n: usize) -> AppResult<Vec<(MovieId, f64)>> {
        let mut merged: HashMap<MovieId, f64> = HashMap::new();
        for scorer in &self.scorers {
            let kind = scorer.kind();
            let proposals = scorer.top(user_id, 2 * n).await?;
            tracing::debug!(
                scorer = kind.as_str(),
                proposals = proposals.len(),
                "Scored candidates"
            );
            for (movie_id, score) in proposals {
                *merged.entry(movie_id).or_insert(0.0) += score * kind.weight();
            }
        }

        let mut pool: Vec<(MovieId, f64)> = merged.into_iter().collect();
        sort_best_first(&mut pool);
        pool.truncate(3 * n);
        Ok(pool)
    }

    fn bandit_picks(
        &self,
        bandit: &LinUcb,
        user_id: UserId,
        context: &ContextMap,
        pool: &[(MovieId, f64)],
        n: usize,
    ) -> Result<Vec<Pick>, BanditError> {
        let arms: Vec<MovieId> = pool
            .iter()
            .map(|(movie_id, _)| *movie_id)
            .filter(|movie_id| bandit.contains(*movie_id))
            .collect();
        if arms.len() < pool.len() {
            tracing::debug!(
                dropped = pool.len() - arms.len(),
                "Dropped candidates outside the arm universe"
            );
        }
        if arms.is_empty() {
            return Ok(weighted_picks(pool, n));
        }

        let merged: HashMap<MovieId, f64> = pool.iter().copied().collect();
        let x = self.contexts.build(user_id, context);
        let ranked = bandit.rank(&x, &arms, n)?;

        Ok(ranked
            .into_iter()
            .map(|score| Pick {
                movie_id: score.arm,
                score: merged.get(&score.arm).copied().unwrap_or_default(),
                bandit: Some(score),
            })
            .collect())
    }

    async fn hydrate(&self, picks: &[Pick]) -> AppResult<Vec<Recommendation>> {
        let ids: Vec<MovieId> = picks.iter().map(|pick| pick.movie_id).collect();
        let movies: HashMap<MovieId, MovieSummary> = self
            .repository
            .movies_by_ids(&ids)
            .await?
            .into_iter()
            .map(|movie| (movie.id, movie))
            .collect();

        Ok(picks
            .iter()
            .filter_map(|pick| {
                let movie = movies.get(&pick.movie_id)?;
                Some(Recommendation {
                    movie_id: movie.id,
                    title: movie.title.clone(),
                    score: pick.score,
                    source: if pick.bandit.is_some() {
                        RecommendationSource::Bandit
                    } else {
                        RecommendationSource::Weighted
                    },
                    reason: self.reason(pick, movie),
                })
            })
            .collect())
    }

    fn reason(&self, pick: &Pick, movie: &MovieSummary) -> String {
        if let Some(score) = pick.bandit {
            return format!(
                "Picked for your current context (expected reward {:.2}, exploration bonus {:.2})",
                score.predicted_reward, score.confidence
            );
        }

        let kinds = self.scorer_kinds();
        if kinds.contains(&ScorerKind::Gnn) {
            format!(
                "Shares director or cast with movies you liked: {}",
                movie.director.as_deref().unwrap_or("unknown director")
            )
        } else if kinds.contains(&ScorerKind::Ncf) {
            "Liked by viewers with similar taste".to_string()
        } else {
            match &movie.genre {
                Some(genre) => format!("Well reviewed {} (score {:.2})", genre, pick.score),
                None => format!("Well reviewed by other viewers (score {:.2})", pick.score),
            }
        }
    }

    async fn record_exposure(
        &self,
        request: &RecommendationRequest,
        variant: Variant,
        served: usize,
    ) {
        let assignment = NewAssignment {
            user_id: request.user_id,
            experiment_name: BANDIT_EXPERIMENT.to_string(),
            variant,
            model_version: MODEL_VERSION.to_string(),
            metrics: json!({
                "requested": request.num_recommendations,
                "served": served,
                "context": request.context,
            }),
        };

        if let Err(e) = self.repository.record_assignment(assignment).await {
            tracing::warn!(error = %e, user_id = request.user_id, "Failed to record A/B exposure");
        }
    }
}

fn weighted_picks(pool: &[(MovieId, f64)], n: usize) -> Vec<Pick> {
    pool.iter()
        .take(n)
        .map(|&(movie_id, score)| Pick {
            movie_id,
            score,
            bandit: None,
        })
        .collect()
}

/// Descending by score, ascending id among equal scores
fn sort_best_first(scored: &mut [(MovieId, f64)]) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}
