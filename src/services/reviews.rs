use std::sync::Arc;

use super::sentiment::ReviewAnalyzer;
use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::{NewReview, Review, ReviewAnalysis, ReviewRequest},
};

/// Longest author name the `reviews` table accepts
pub const MAX_AUTHOR_NAME: usize = 100;

/// Scores incoming reviews and stores them with their movie's new rating
pub struct ReviewService {
    analyzer: ReviewAnalyzer,
    repository: Arc<dyn Repository>,
}

impl ReviewService {
    pub fn new(analyzer: ReviewAnalyzer, repository: Arc<dyn Repository>) -> Self {
        Self {
            analyzer,
            repository,
        }
    }

    pub fn analyzer(&self) -> &ReviewAnalyzer {
        &self.analyzer
    }

    pub fn analyze(&self, text: &str) -> ReviewAnalysis {
        self.analyzer.analyze(text)
    }

    pub async fn submit(&self, request: ReviewRequest) -> AppResult<Review> {
        if request.content.trim().is_empty() {
            return Err(AppError::InvalidInput("content must not be empty".to_string()));
        }
        let author_len = request.author_name.trim().chars().count();
        if author_len == 0 || author_len > MAX_AUTHOR_NAME {
            return Err(AppError::InvalidInput(format!(
                "author_name must be 1 to {} characters",
                MAX_AUTHOR_NAME
            )));
        }

        let analysis = self.analyzer.analyze(&request.content);
        let review = self
            .repository
            .record_review(NewReview {
                movie_id: request.movie_id,
                author_name: request.author_name.trim().to_string(),
                content: request.content,
                analysis,
            })
            .await?;

        tracing::info!(
            review_id = review.id,
            movie_id = review.movie_id,
            sentiment = review.analysis.sentiment.sentiment_label.as_str(),
            "Stored review"
        );

        Ok(review)
    }
}
