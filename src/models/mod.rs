use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod experiment;
mod interaction;
mod movie;
mod review;

pub use experiment::{NewAssignment, Variant};
pub use interaction::{Interaction, InteractionKind, NewInteraction, UserId};
pub use movie::{MovieId, MovieRating, MovieSummary};
pub use review::{
    Aspect, Emotion, NewReview, Review, ReviewAnalysis, ReviewRequest, ReviewScores,
    SentimentLabel, SentimentProbabilities, SentimentResult,
};

/// Free-form request context, e.g. `{"time": "evening", "device": "mobile"}`
pub type ContextMap = HashMap<String, String>;

fn default_num_recommendations() -> usize {
    10
}

/// Request for personalised recommendations
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    #[serde(default = "default_num_recommendations")]
    pub num_recommendations: usize,
    /// The bandit only re-ranks when a context is supplied
    #[serde(default)]
    pub context: Option<ContextMap>,
}

/// Which stage of the pipeline produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    /// Picked by the contextual bandit
    Bandit,
    /// Taken from the weighted scorer ranking
    Weighted,
}

/// One recommended movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub movie_id: MovieId,
    pub title: String,
    /// Merged weighted score of the candidate scorers
    pub score: f64,
    pub source: RecommendationSource,
    pub reason: String,
}

/// Recommendations plus the experiment bucket that shaped them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    pub recommendations: Vec<Recommendation>,
}

/// Observed outcome of a recommendation
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub kind: InteractionKind,
    /// Overrides the kind's default reward
    #[serde(default)]
    pub reward: Option<f64>,
    #[serde(default)]
    pub context: ContextMap,
    #[serde(default)]
    pub watch_duration: Option<i32>,
    #[serde(default)]
    pub completion_rate: Option<f64>,
}
