use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::review::{Aspect, Emotion, ReviewScores};

/// Emotion scores above this count a review towards that emotion
const EMOTION_PRESENT: f64 = 0.5;

/// Movie primary key
pub type MovieId = i64;

/// The subset of a movie row the recommendation responses need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MovieSummary {
    pub id: MovieId,
    pub title: String,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub poster_url: Option<String>,
}

/// Review statistics kept per movie
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MovieRating {
    pub movie_id: MovieId,
    /// Mean sentiment score of all reviews, in [-1, 1]
    pub avg_sentiment: f64,
    pub review_count: i32,
    /// Mean score per aspect over the reviews that were aspect-scored
    #[serde(default)]
    pub avg_aspects: BTreeMap<Aspect, f64>,
    /// Number of reviews in which each emotion is clearly present
    #[serde(default)]
    pub emotion_distribution: BTreeMap<Emotion, u32>,
}

impl MovieRating {
    /// Recomputes the statistics of `movie_id` from all of its reviews
    pub fn aggregate(movie_id: MovieId, reviews: &[ReviewScores]) -> Self {
        if reviews.is_empty() {
            return Self {
                movie_id,
                ..Self::default()
            };
        }

        let avg_sentiment =
            reviews.iter().map(|r| r.sentiment_score).sum::<f64>() / reviews.len() as f64;

        let mut aspect_sums: BTreeMap<Aspect, (f64, u32)> = BTreeMap::new();
        for aspects in reviews.iter().filter_map(|r| r.aspects.as_ref()) {
            for (&aspect, &score) in aspects {
                let entry = aspect_sums.entry(aspect).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        let mut emotion_distribution = BTreeMap::new();
        let scored: Vec<&BTreeMap<Emotion, f64>> =
            reviews.iter().filter_map(|r| r.emotions.as_ref()).collect();
        if !scored.is_empty() {
            for emotion in Emotion::ALL {
                let count = scored
                    .iter()
                    .filter(|emotions| {
                        emotions.get(&emotion).copied().unwrap_or(0.0) > EMOTION_PRESENT
                    })
                    .count() as u32;
                emotion_distribution.insert(emotion, count);
            }
        }

        Self {
            movie_id,
            avg_sentiment,
            review_count: reviews.len() as i32,
            avg_aspects: aspect_sums
                .into_iter()
                .map(|(aspect, (sum, n))| (aspect, sum / n as f64))
                .collect(),
            emotion_distribution,
        }
    }
}
