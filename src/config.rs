use serde::{Deserialize, Serialize};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL connection URL; the in-memory repository is used when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Use Redis for caching and bandit checkpoints
    #[serde(default)]
    pub enable_redis: bool,

    /// TTL for cached popularity lists, in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS (comma-separated in the environment)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Loaded separately from the same variables
    #[serde(skip)]
    pub features: FeatureFlags,

    #[serde(skip)]
    pub bandit: BanditConfig,
}

/// Switches deciding which scorers are built at startup
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FeatureFlags {
    /// Aspect-based sentiment
    #[serde(default = "enabled")]
    pub enable_absa: bool,

    #[serde(default = "enabled")]
    pub enable_emotion_classification: bool,

    /// Contextual bandit re-ranking
    #[serde(default = "enabled")]
    pub enable_rl: bool,

    /// Random placeholder scorers standing in for untrained models
    #[serde(default)]
    pub enable_ncf: bool,
    #[serde(default)]
    pub enable_gnn: bool,
    #[serde(default)]
    pub enable_sequential: bool,

    #[serde(default = "enabled")]
    pub enable_ab_testing: bool,

    /// Fraction of users bucketed into the bandit treatment
    #[serde(default = "default_ab_test_split")]
    pub ab_test_split: f64,
}

/// LinUCB parameters
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BanditConfig {
    /// Exploration coefficient
    #[serde(default = "default_bandit_alpha")]
    pub bandit_alpha: f64,

    /// Arms are movie ids `1..=bandit_num_arms`
    #[serde(default = "default_bandit_num_arms")]
    pub bandit_num_arms: i64,

    /// Context vector dimension
    #[serde(default = "default_context_dim")]
    pub context_dim: usize,

    /// Seconds between bandit checkpoints
    #[serde(default = "default_checkpoint_interval")]
    pub bandit_checkpoint_secs: u64,

    /// Seed for the placeholder scorers; entropy-seeded when unset
    #[serde(default)]
    pub recommender_seed: Option<u64>,
}

fn enabled() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_cache_ttl() -> u64 {
    1800
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:8501".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_ab_test_split() -> f64 {
    0.5
}

fn default_bandit_alpha() -> f64 {
    0.1
}

fn default_bandit_num_arms() -> i64 {
    1000
}

fn default_context_dim() -> usize {
    16
}

fn default_checkpoint_interval() -> u64 {
    300
}

/// Smallest context dimension that still leaves a user-bucket slot
pub const MIN_CONTEXT_DIM: usize = 10;

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_absa: true,
            enable_emotion_classification: true,
            enable_rl: true,
            enable_ncf: false,
            enable_gnn: false,
            enable_sequential: false,
            enable_ab_testing: true,
            ab_test_split: default_ab_test_split(),
        }
    }
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            bandit_alpha: default_bandit_alpha(),
            bandit_num_arms: default_bandit_num_arms(),
            context_dim: default_context_dim(),
            bandit_checkpoint_secs: default_checkpoint_interval(),
            recommender_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from key/value pairs named like the environment
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> anyhow::Result<Self> {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        let mut config = envy::from_iter::<_, Config>(vars.clone())
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.features = envy::from_iter(vars.clone())
            .map_err(|e| anyhow::anyhow!("Failed to load feature flags: {}", e))?;
        config.bandit = envy::from_iter(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load bandit config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the services cannot be built from
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bandit.context_dim < MIN_CONTEXT_DIM {
            anyhow::bail!(
                "CONTEXT_DIM must be at least {}, got {}",
                MIN_CONTEXT_DIM,
                self.bandit.context_dim
            );
        }
        if !(self.bandit.bandit_alpha.is_finite() && self.bandit.bandit_alpha > 0.0) {
            anyhow::bail!("BANDIT_ALPHA must be positive");
        }
        if self.bandit.bandit_num_arms < 1 {
            anyhow::bail!("BANDIT_NUM_ARMS must be at least 1");
        }
        if self.bandit.bandit_checkpoint_secs == 0 {
            anyhow::bail!("BANDIT_CHECKPOINT_SECS must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.features.ab_test_split) {
            anyhow::bail!("AB_TEST_SPLIT must be within [0, 1]");
        }
        Ok(())
    }
}
