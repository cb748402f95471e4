use std::sync::Arc;

use crate::{
    config::Config,
    db::{Cache, Repository},
    error::BanditError,
    services::{
        build_scorers, AbTesting, ContextBuilder, LinUcb, Recommender, ReviewAnalyzer,
        ReviewService,
    },
};

/// Shared application state
///
/// Every service is built once from the configuration; capabilities switched
/// off by feature flags are simply not constructed.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recommender: Arc<Recommender>,
    pub reviews: Arc<ReviewService>,
}

impl AppState {
    /// Builds the services described by `config` on top of `repository`
    pub fn build(
        config: Config,
        repository: Arc<dyn Repository>,
        cache: Option<Cache>,
    ) -> Result<Self, BanditError> {
        let features = &config.features;
        let contexts = ContextBuilder::new(config.bandit.context_dim)?;

        let scorers = build_scorers(
            features,
            config.bandit.recommender_seed,
            repository.clone(),
            cache,
            config.cache_ttl,
        );
        let mut recommender = Recommender::new(scorers, repository.clone(), contexts);

        if features.enable_rl {
            let bandit = LinUcb::new(
                1..=config.bandit.bandit_num_arms,
                config.bandit.context_dim,
                config.bandit.bandit_alpha,
            )?;
            recommender = recommender.with_bandit(Arc::new(bandit))?;

            if features.enable_ab_testing {
                recommender = recommender.with_ab_testing(AbTesting::new(features.ab_test_split));
            }
        }

        let analyzer = ReviewAnalyzer::from_flags(features);

        tracing::info!(
            rl = features.enable_rl,
            ab_testing = features.enable_ab_testing,
            absa = analyzer.aspects_enabled(),
            emotions = analyzer.emotions_enabled(),
            scorers = recommender.scorer_kinds().len(),
            "Application state built"
        );

        Ok(Self {
            config: Arc::new(config),
            recommender: Arc::new(recommender),
            reviews: Arc::new(ReviewService::new(analyzer, repository)),
        })
    }

    /// The bandit, when reinforcement-learning re-ranking is enabled
    pub fn bandit(&self) -> Option<&Arc<LinUcb>> {
        self.recommender.bandit()
    }
}
