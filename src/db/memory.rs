use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        Interaction, MovieId, MovieRating, MovieSummary, NewAssignment, NewInteraction,
        NewReview, Review, ReviewScores,
    },
};

/// Entries kept per log before the oldest are dropped
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// Process-local repository used when no database is configured
///
/// Meant for development and tests. Reviews and ratings are kept in full; the
/// interaction and exposure logs only keep the most recent entries.
#[derive(Clone)]
pub struct MemoryRepository {
    inner: Arc<RwLock<MemoryStore>>,
}

#[derive(Default)]
struct MemoryStore {
    movies: HashMap<MovieId, MovieSummary>,
    ratings: HashMap<MovieId, MovieRating>,
    reviews: Vec<Review>,
    interactions: VecDeque<Interaction>,
    interactions_recorded: i64,
    assignments: VecDeque<NewAssignment>,
    log_capacity: usize,
}

fn push_bounded<T>(log: &mut VecDeque<T>, capacity: usize, entry: T) {
    if log.len() >= capacity {
        log.pop_front();
    }
    log.push_back(entry);
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStore {
                log_capacity: capacity.max(1),
                ..MemoryStore::default()
            })),
        }
    }

    pub async fn insert_movie(&self, movie: MovieSummary) {
        self.inner.write().await.movies.insert(movie.id, movie);
    }

    pub async fn set_rating(&self, rating: MovieRating) {
        self.inner
            .write()
            .await
            .ratings
            .insert(rating.movie_id, rating);
    }

    pub async fn rating(&self, movie_id: MovieId) -> Option<MovieRating> {
        self.inner.read().await.ratings.get(&movie_id).cloned()
    }

    /// Interactions recorded so far, oldest first
    pub async fn interactions(&self) -> Vec<Interaction> {
        self.inner.read().await.interactions.iter().cloned().collect()
    }

    pub async fn assignments(&self) -> Vec<NewAssignment> {
        self.inner.read().await.assignments.iter().cloned().collect()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn movies_by_ids(&self, ids: &[MovieId]) -> AppResult<Vec<MovieSummary>> {
        let store = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.movies.get(id).cloned())
            .collect())
    }

    async fn popular_movies(&self, limit: usize) -> AppResult<Vec<MovieId>> {
        let store = self.inner.read().await;
        let mut rated: Vec<&MovieRating> = store
            .ratings
            .values()
            .filter(|rating| rating.review_count > 0 && store.movies.contains_key(&rating.movie_id))
            .collect();

        rated.sort_by(|a, b| {
            b.avg_sentiment
                .partial_cmp(&a.avg_sentiment)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.review_count.cmp(&a.review_count))
                .then(a.movie_id.cmp(&b.movie_id))
        });

        Ok(rated
            .into_iter()
            .take(limit)
            .map(|rating| rating.movie_id)
            .collect())
    }

    async fn record_interaction(&self, interaction: NewInteraction) -> AppResult<Interaction> {
        let mut store = self.inner.write().await;
        store.interactions_recorded += 1;
        let id = store.interactions_recorded;
        let interaction = Interaction::from_new(id, interaction, Utc::now());
        let capacity = store.log_capacity;
        push_bounded(&mut store.interactions, capacity, interaction.clone());
        Ok(interaction)
    }

    async fn record_assignment(&self, assignment: NewAssignment) -> AppResult<()> {
        let mut store = self.inner.write().await;
        let capacity = store.log_capacity;
        push_bounded(&mut store.assignments, capacity, assignment);
        Ok(())
    }

    async fn record_review(&self, review: NewReview) -> AppResult<Review> {
        let mut store = self.inner.write().await;
        if !store.movies.contains_key(&review.movie_id) {
            return Err(AppError::NotFound(format!("Movie {} not found", review.movie_id)));
        }

        let movie_id = review.movie_id;
        let review = Review::from_new(store.reviews.len() as i64 + 1, review, Utc::now());
        store.reviews.push(review.clone());

        let scores: Vec<ReviewScores> = store
            .reviews
            .iter()
            .filter(|stored| stored.movie_id == movie_id)
            .map(|stored| stored.analysis.scores())
            .collect();
        store
            .ratings
            .insert(movie_id, MovieRating::aggregate(movie_id, &scores));

        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        InteractionKind, ReviewAnalysis, SentimentLabel, SentimentProbabilities, SentimentResult,
    };

    fn movie(id: MovieId) -> MovieSummary {
        MovieSummary {
            id,
            title: format!("Movie {}", id),
            genre: None,
            director: None,
            poster_url: None,
        }
    }

    fn rating(movie_id: MovieId, avg_sentiment: f64, review_count: i32) -> MovieRating {
        MovieRating {
            movie_id,
            avg_sentiment,
            review_count,
            ..MovieRating::default()
        }
    }

    fn interaction(movie_id: MovieId) -> NewInteraction {
        NewInteraction {
            user_id: 1,
            movie_id,
            kind: InteractionKind::Like,
            reward: 3.0,
            watch_duration: None,
            completion_rate: None,
        }
    }

    fn review(movie_id: MovieId, sentiment_score: f64) -> NewReview {
        NewReview {
            movie_id,
            author_name: "tester".to_string(),
            content: "review".to_string(),
            analysis: ReviewAnalysis {
                sentiment: SentimentResult {
                    sentiment_score,
                    sentiment_label: SentimentLabel::Neutral,
                    confidence: 0.4,
                    probabilities: SentimentProbabilities {
                        negative: 0.3,
                        neutral: 0.4,
                        positive: 0.3,
                    },
                    uncertainty: 0.1,
                },
                aspects: None,
                emotions: None,
            },
        }
    }

    #[tokio::test]
    async fn test_movies_by_ids_omits_unknown() {
        let repo = MemoryRepository::new();
        repo.insert_movie(movie(1)).await;
        repo.insert_movie(movie(2)).await;

        let movies = repo.movies_by_ids(&[2, 99, 1]).await.unwrap();
        let ids: Vec<MovieId> = movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_popular_movies_ordering() {
        let repo = MemoryRepository::new();
        for id in 1..=5 {
            repo.insert_movie(movie(id)).await;
        }
        repo.set_rating(rating(1, 0.2, 10)).await;
        repo.set_rating(rating(2, 0.9, 1)).await;
        repo.set_rating(rating(3, 0.2, 30)).await;
        repo.set_rating(rating(4, 1.0, 0)).await; // no reviews
        repo.set_rating(rating(42, 1.0, 5)).await; // not in catalogue

        assert_eq!(repo.popular_movies(10).await.unwrap(), vec![2, 3, 1]);
        assert_eq!(repo.popular_movies(2).await.unwrap(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_record_interaction_assigns_ids() {
        let repo = MemoryRepository::new();

        let first = tokio_test::assert_ok!(repo.record_interaction(interaction(5)).await);
        let second = tokio_test::assert_ok!(repo.record_interaction(interaction(5)).await);

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repo.interactions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_logs_keep_most_recent_entries() {
        let repo = MemoryRepository::with_log_capacity(2);
        for movie_id in 1..=3 {
            repo.record_interaction(interaction(movie_id)).await.unwrap();
        }

        let ids: Vec<i64> = repo.interactions().await.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 3]);

        for user_id in 1..=3 {
            repo.record_assignment(NewAssignment {
                user_id,
                experiment_name: "exp".to_string(),
                variant: crate::models::Variant::Control,
                model_version: "v".to_string(),
                metrics: serde_json::Value::Null,
            })
            .await
            .unwrap();
        }
        let users: Vec<i64> = repo.assignments().await.iter().map(|a| a.user_id).collect();
        assert_eq!(users, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_record_review_refreshes_rating() {
        let repo = MemoryRepository::new();
        repo.insert_movie(movie(1)).await;
        repo.insert_movie(movie(2)).await;

        repo.record_review(review(1, 1.0)).await.unwrap();
        let second = repo.record_review(review(1, 0.0)).await.unwrap();
        repo.record_review(review(2, -1.0)).await.unwrap();

        assert_eq!(second.id, 2);
        let rating = repo.rating(1).await.unwrap();
        assert_eq!(rating.review_count, 2);
        assert_eq!(rating.avg_sentiment, 0.5);
        assert_eq!(repo.popular_movies(10).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_record_review_unknown_movie() {
        let repo = MemoryRepository::new();

        let err = repo.record_review(review(7, 1.0)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(repo.rating(7).await.is_none());
    }
}
