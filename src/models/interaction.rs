use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::MovieId;

/// User primary key
pub type UserId = i64;

/// What the user did with a recommended movie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Click,
    /// Watched to completion
    Watch,
    Like,
}

impl InteractionKind {
    /// Reward fed to the bandit when no explicit reward is given
    pub fn default_reward(self) -> f64 {
        match self {
            InteractionKind::Click => 1.0,
            InteractionKind::Watch => 2.0,
            InteractionKind::Like => 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Click => "click",
            InteractionKind::Watch => "watch",
            InteractionKind::Like => "like",
        }
    }
}

impl Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interaction about to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInteraction {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub kind: InteractionKind,
    pub reward: f64,
    pub watch_duration: Option<i32>,
    pub completion_rate: Option<f64>,
}

/// Persisted user-movie interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub kind: InteractionKind,
    pub reward: f64,
    pub watch_duration: Option<i32>,
    pub completion_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    pub fn from_new(id: i64, new: NewInteraction, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            movie_id: new.movie_id,
            kind: new.kind,
            reward: new.reward,
            watch_duration: new.watch_duration,
            completion_rate: new.completion_rate,
            created_at,
        }
    }
}
