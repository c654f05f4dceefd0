use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub cache_ttl_secs: u64,
    pub cache_max_capacity: u64,
    pub store_timeout_secs: u64,
    pub insert_max_attempts: u32,
    pub insert_initial_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env_or("SERVER_PORT", "3000").parse()?,
            database_url: env::var("DATABASE_URL")?,
            kafka_brokers: env_or("KAFKA_BROKERS", "127.0.0.1:9092"),
            kafka_topic: env_or("KAFKA_TOPIC", "orders"),
            kafka_group_id: env_or("KAFKA_GROUP_ID", "orderflow"),
            cache_ttl_secs: env_or("CACHE_TTL_SECS", "600").parse()?,
            cache_max_capacity: env_or("CACHE_MAX_CAPACITY", "10000").parse()?,
            store_timeout_secs: env_or("STORE_TIMEOUT_SECS", "5").parse()?,
            insert_max_attempts: env_or("INSERT_MAX_ATTEMPTS", "3").parse()?,
            insert_initial_backoff_ms: env_or("INSERT_INITIAL_BACKOFF_MS", "100").parse()?,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
