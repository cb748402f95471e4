use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use tracing::instrument;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        Aspect, Emotion, Interaction, MovieId, MovieRating, MovieSummary, NewAssignment,
        NewInteraction, NewReview, Review, ReviewScores,
    },
};

type ScoreRow = (
    f64,
    Option<Json<BTreeMap<Aspect, f64>>>,
    Option<Json<BTreeMap<Emotion, f64>>>,
);

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Repository backed by the Postgres schema in `migrations/`
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Repository for PgRepository {
    #[instrument(skip(self), fields(count = ids.len()))]
    async fn movies_by_ids(&self, ids: &[MovieId]) -> AppResult<Vec<MovieSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let movies = sqlx::query_as::<_, MovieSummary>(
            "SELECT id, title, genre, director, poster_url FROM movies WHERE id = ANY($1)",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(movies)
    }

    #[instrument(skip(self))]
    async fn popular_movies(&self, limit: usize) -> AppResult<Vec<MovieId>> {
        let ids = sqlx::query_scalar::<_, MovieId>(
            "SELECT m.id FROM movies m \
             JOIN ratings r ON r.movie_id = m.id \
             WHERE r.review_count > 0 \
             ORDER BY r.avg_sentiment DESC, r.review_count DESC, m.id ASC \
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn record_interaction(&self, interaction: NewInteraction) -> AppResult<Interaction> {
        let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO interactions \
             (user_id, movie_id, interaction_type, watch_duration, completion_rate, reward) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, created_at",
        )
        .bind(interaction.user_id)
        .bind(interaction.movie_id)
        .bind(interaction.kind.as_str())
        .bind(interaction.watch_duration)
        .bind(interaction.completion_rate)
        .bind(interaction.reward)
        .fetch_one(&self.pool)
        .await?;

        Ok(Interaction::from_new(id, interaction, created_at))
    }

    async fn record_assignment(&self, assignment: NewAssignment) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO ab_tests (user_id, experiment_name, variant, model_version, metrics) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(assignment.user_id)
        .bind(&assignment.experiment_name)
        .bind(assignment.variant.as_str())
        .bind(&assignment.model_version)
        .bind(&assignment.metrics)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, review), fields(movie_id = review.movie_id))]
    async fn record_review(&self, review: NewReview) -> AppResult<Review> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises reviews of the same movie, keeping the aggregate exact
        let movie =
            sqlx::query_scalar::<_, MovieId>("SELECT id FROM movies WHERE id = $1 FOR UPDATE")
                .bind(review.movie_id)
                .fetch_optional(&mut *tx)
                .await?;
        if movie.is_none() {
            return Err(AppError::NotFound(format!("Movie {} not found", review.movie_id)));
        }

        let sentiment = &review.analysis.sentiment;
        let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO reviews \
             (movie_id, author_name, content, sentiment_score, sentiment_label, confidence, \
              aspect_sentiments, emotions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, created_at",
        )
        .bind(review.movie_id)
        .bind(&review.author_name)
        .bind(&review.content)
        .bind(sentiment.sentiment_score)
        .bind(sentiment.sentiment_label.as_str())
        .bind(sentiment.confidence)
        .bind(review.analysis.aspects.as_ref().map(Json))
        .bind(review.analysis.emotions.as_ref().map(Json))
        .fetch_one(&mut *tx)
        .await?;

        let scores: Vec<ReviewScores> = sqlx::query_as::<_, ScoreRow>(
            "SELECT COALESCE(sentiment_score, 0.0), aspect_sentiments, emotions \
             FROM reviews WHERE movie_id = $1",
        )
        .bind(review.movie_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(sentiment_score, aspects, emotions)| ReviewScores {
            sentiment_score,
            aspects: aspects.map(|Json(aspects)| aspects),
            emotions: emotions.map(|Json(emotions)| emotions),
        })
        .collect();

        let rating = MovieRating::aggregate(review.movie_id, &scores);
        sqlx::query(
            "INSERT INTO ratings \
             (movie_id, avg_sentiment, review_count, avg_aspects, emotion_distribution, \
              updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT (movie_id) DO UPDATE SET \
             avg_sentiment = EXCLUDED.avg_sentiment, \
             review_count = EXCLUDED.review_count, \
             avg_aspects = EXCLUDED.avg_aspects, \
             emotion_distribution = EXCLUDED.emotion_distribution, \
             updated_at = NOW()",
        )
        .bind(rating.movie_id)
        .bind(rating.avg_sentiment)
        .bind(rating.review_count)
        .bind(Json(&rating.avg_aspects))
        .bind(Json(&rating.emotion_distribution))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            review_id = id,
            review_count = rating.review_count,
            avg_sentiment = rating.avg_sentiment,
            "Updated movie rating"
        );

        Ok(Review::from_new(id, review, created_at))
    }
}
