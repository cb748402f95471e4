use crate::{
    error::AppResult,
    models::{
        Interaction, MovieId, MovieSummary, NewAssignment, NewInteraction, NewReview, Review,
    },
};

/// Storage operations the recommendation and feedback paths depend on
///
/// Implemented by [`super::PgRepository`] when a database is configured and by
/// [`super::MemoryRepository`] otherwise.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Looks up movies by id; ids with no row are left out
    async fn movies_by_ids(&self, ids: &[MovieId]) -> AppResult<Vec<MovieSummary>>;

    /// Reviewed movies ordered by average sentiment, then review count
    async fn popular_movies(&self, limit: usize) -> AppResult<Vec<MovieId>>;

    async fn record_interaction(&self, interaction: NewInteraction) -> AppResult<Interaction>;

    /// Persists an A/B exposure
    async fn record_assignment(&self, assignment: NewAssignment) -> AppResult<()>;

    /// Stores an analysed review and recomputes its movie's rating
    ///
    /// Fails with [`crate::error::AppError::NotFound`] for an unknown movie.
    async fn record_review(&self, review: NewReview) -> AppResult<Review>;
}
