use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.kafka_brokers.is_empty() {
        anyhow::bail!("KAFKA_BROKERS is empty");
    }
    if config.kafka_topic.is_empty() {
        anyhow::bail!("KAFKA_TOPIC is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.cache_ttl_secs == 0 {
        anyhow::bail!("CACHE_TTL_SECS must be greater than 0");
    }
    if config.insert_max_attempts == 0 {
        anyhow::bail!("INSERT_MAX_ATTEMPTS must be greater than 0");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    // Check if migrations are up to date
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost:5432/orders".to_string(),
            kafka_brokers: "127.0.0.1:9092".to_string(),
            kafka_topic: "orders".to_string(),
            kafka_group_id: "orderflow".to_string(),
            cache_ttl_secs: 600,
            cache_max_capacity: 10_000,
            store_timeout_secs: 5,
            insert_max_attempts: 3,
            insert_initial_backoff_ms: 100,
        }
    }

    #[test]
    fn test_validate_env_vars_accepts_base_config() {
        assert!(validate_env_vars(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_env_vars_empty_database_url() {
        let mut config = base_config();
        config.database_url = String::new();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_empty_topic() {
        let mut config = base_config();
        config.kafka_topic = String::new();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_zero_ttl() {
        let mut config = base_config();
        config.cache_ttl_secs = 0;
        assert!(validate_env_vars(&config).is_err());
    }
}
