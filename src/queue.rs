use std::env;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::info;

use crate::input::SearchRow;
use crate::sink::STATUS_INCOMPLETE;
use crate::{Error, Result};

const DEFAULT_DB_PORT: u16 = 3306;

/// Database settings, read from the environment (`.env` is loaded at startup).
#[derive(Clone)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbSettings {
    pub fn from_env() -> Result<Self> {
        let port = match env::var("DB_PORT") {
            Ok(port) => port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("DB_PORT is not a port number: '{port}'")))?,
            Err(_) => DEFAULT_DB_PORT,
        };

        Ok(Self {
            host: required("DB_HOST")?,
            port,
            user: required("DB_USER")?,
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            database: required("DB_DATABASE")?,
        })
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

impl std::fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

fn required(key: &'static str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(Error::MissingEnv(key))
}

pub async fn connect(settings: &DbSettings) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(2)
        .connect_with(settings.connect_options())
        .await?;
    info!("Connected to the database {} on {}", settings.database, settings.host);
    Ok(pool)
}

/// Terms of a campaign that still need scraping, in queue order.
pub async fn pending_rows(pool: &MySqlPool, campaign_id: i64) -> Result<Vec<SearchRow>> {
    let rows: Vec<(i64, Option<String>)> = sqlx::query_as(
        "SELECT queue_id, search_keyword FROM superscraper_queue \
         WHERE campaign_id = ? AND (status IS NULL OR status = '' OR status = ?) \
         ORDER BY queue_id",
    )
    .bind(campaign_id)
    .bind(STATUS_INCOMPLETE)
    .fetch_all(pool)
    .await?;

    info!("Found {} rows to process for campaign {campaign_id}", rows.len());
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, (queue_id, keyword))| SearchRow {
            number: i + 1,
            queue_id: Some(queue_id),
            term: keyword.unwrap_or_default().trim().to_string(),
        })
        .collect())
}

/// Campaign names are sequential numbers. Anything unparsable counts as 0.
pub fn next_campaign_name(latest: Option<&str>) -> i64 {
    latest
        .and_then(|name| name.trim().parse::<i64>().ok())
        .unwrap_or(0)
        + 1
}

/// Creates a new campaign and queues every term under it. Returns the campaign id.
pub async fn enqueue_campaign(pool: &MySqlPool, terms: &[String]) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let latest: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT CAST(campaign_name AS CHAR) FROM campaigns ORDER BY campaign_id DESC LIMIT 1",
    )
    .fetch_optional(&mut *tx)
    .await?;
    let name = next_campaign_name(latest.and_then(|(name,)| name).as_deref());

    let campaign_id = sqlx::query("INSERT INTO campaigns (campaign_name) VALUES (?)")
        .bind(name)
        .execute(&mut *tx)
        .await?
        .last_insert_id() as i64;

    for term in terms {
        sqlx::query("INSERT INTO superscraper_queue (campaign_id, search_keyword) VALUES (?, ?)")
            .bind(campaign_id)
            .bind(term)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!("Queued {} search terms under campaign {name} (id {campaign_id})", terms.len());
    Ok(campaign_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_names_count_up() {
        assert_eq!(next_campaign_name(None), 1);
        assert_eq!(next_campaign_name(Some("41")), 42);
        assert_eq!(next_campaign_name(Some(" 7 ")), 8);
        assert_eq!(next_campaign_name(Some("spring")), 1);
    }

    #[test]
    fn debug_output_hides_password() {
        let settings = DbSettings {
            host: "localhost".into(),
            port: 3306,
            user: "scraper".into(),
            password: "hunter2".into(),
            database: "superscraper".into(),
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
