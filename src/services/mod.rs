pub mod bandit;
pub mod checkpoint;
pub mod context;
pub mod experiments;
pub mod recommender;
pub mod reviews;
pub mod sentiment;

pub use bandit::{ArmId, ArmScore, BanditSnapshot, LinUcb};
pub use checkpoint::{restore_bandit, spawn_checkpointer, RedisSnapshotStore, SnapshotStore};
pub use context::ContextBuilder;
pub use experiments::AbTesting;
pub use recommender::{build_scorers, Recommender};
pub use reviews::ReviewService;
pub use sentiment::ReviewAnalyzer;
