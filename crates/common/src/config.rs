/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (event queue broker)
    pub redis_url: String,

    /// Name of the Redis list the collector publishes delay events to
    pub queue_name: String,

    /// Firebase Cloud Messaging server key
    pub firebase_key: String,

    /// Push transport request timeout in seconds (default: 20)
    pub push_timeout_secs: u64,

    /// Ask Firebase to validate pushes without delivering them
    pub push_dry_run: bool,

    /// Number of downstream stop times notified per delay event (default: 5)
    pub look_ahead: usize,

    /// Minutes a subscription stays suppressed after being notified (default: 15)
    pub cooldown_minutes: i64,

    /// Upper bound on concurrently running notification tasks; 0 = unbounded
    pub max_concurrent_notifications: usize,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            queue_name: std::env::var("QUEUE_NAME").unwrap_or_else(|_| "notify".to_string()),
            firebase_key: std::env::var("FIREBASE_KEY").unwrap_or_default(),
            push_timeout_secs: std::env::var("PUSH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PUSH_TIMEOUT_SECS must be a valid u64"))?,
            push_dry_run: std::env::var("PUSH_DRY_RUN")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PUSH_DRY_RUN must be true or false"))?,
            look_ahead: std::env::var("LOOK_AHEAD")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("LOOK_AHEAD must be a valid usize"))?,
            cooldown_minutes: std::env::var("COOLDOWN_MINUTES")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("COOLDOWN_MINUTES must be a valid i64"))?,
            max_concurrent_notifications: std::env::var("MAX_CONCURRENT_NOTIFICATIONS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("MAX_CONCURRENT_NOTIFICATIONS must be a valid usize")
                })?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }

    /// The concurrency cap as an option, `None` meaning unbounded fan-out.
    pub fn notification_limit(&self) -> Option<usize> {
        (self.max_concurrent_notifications > 0).then_some(self.max_concurrent_notifications)
    }
}
