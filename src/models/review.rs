use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MovieId;

/// Polarity bucket of a sentiment score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentProbabilities {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl SentimentProbabilities {
    pub fn max(&self) -> f64 {
        self.negative.max(self.neutral).max(self.positive)
    }
}

/// Sentiment of one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    /// In [-1, 1]
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    /// In [0, 1]
    pub confidence: f64,
    pub probabilities: SentimentProbabilities,
    pub uncertainty: f64,
}

/// Review facets scored separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    Acting,
    Plot,
    Cinematography,
    Soundtrack,
    Direction,
    Screenplay,
}

impl Aspect {
    pub const ALL: [Aspect; 6] = [
        Aspect::Acting,
        Aspect::Plot,
        Aspect::Cinematography,
        Aspect::Soundtrack,
        Aspect::Direction,
        Aspect::Screenplay,
    ];
}

/// Basic emotions detected in a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Surprise,
    Fear,
    Disgust,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Surprise,
        Emotion::Fear,
        Emotion::Disgust,
    ];
}

/// Full analysis of a review text
///
/// `aspects` and `emotions` are absent when the corresponding scorer is
/// switched off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    #[serde(flatten)]
    pub sentiment: SentimentResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspects: Option<BTreeMap<Aspect, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<BTreeMap<Emotion, f64>>,
}

impl ReviewAnalysis {
    pub fn scores(&self) -> ReviewScores {
        ReviewScores {
            sentiment_score: self.sentiment.sentiment_score,
            aspects: self.aspects.clone(),
            emotions: self.emotions.clone(),
        }
    }
}

/// The numbers of one stored review that feed its movie's rating
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReviewScores {
    pub sentiment_score: f64,
    pub aspects: Option<BTreeMap<Aspect, f64>>,
    pub emotions: Option<BTreeMap<Emotion, f64>>,
}

/// A review as submitted by a user
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub movie_id: MovieId,
    pub author_name: String,
    pub content: String,
}

/// An analysed review ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub movie_id: MovieId,
    pub author_name: String,
    pub content: String,
    pub analysis: ReviewAnalysis,
}

/// A stored review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub movie_id: MovieId,
    pub author_name: String,
    pub content: String,
    #[serde(flatten)]
    pub analysis: ReviewAnalysis,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn from_new(id: i64, new: NewReview, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            movie_id: new.movie_id,
            author_name: new.author_name,
            content: new.content,
            analysis: new.analysis,
            created_at,
        }
    }
}
