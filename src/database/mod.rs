use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use std::collections::HashSet;
use tracing::info;

use crate::models::ProductRecord;
use crate::sink::RecordSink;

/// SQLite-backed product store, one row per variant
pub struct ProductStore {
    pool: SqlitePool,
    site: String,
}

impl ProductStore {
    pub async fn connect(db_url: &str, site: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        // Create database file if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database file");
            Sqlite::create_database(db_url).await?;
        }

        let pool = if in_memory {
            // Every connection to :memory: is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(db_url)
                .await?
        } else {
            SqlitePool::connect(db_url).await?
        };

        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self {
            pool,
            site: site.to_string(),
        })
    }

    pub async fn product_ids(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT product_id FROM products WHERE site = ?")
            .bind(&self.site)
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .into_iter()
            .map(|row| row.get::<String, _>("product_id"))
            .collect();

        Ok(ids)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM products WHERE site = ?")
            .bind(&self.site)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("total"))
    }

    /// Inserts the record, replacing any earlier row with the same `product_id`
    pub async fn save_product(&self, record: &ProductRecord) -> Result<()> {
        let image_urls = serde_json::to_string(&record.image_urls)?;

        sqlx::query(
            r"
            INSERT INTO products (
                product_id, site, name, url, price, color_name, color_code,
                image_urls, image_count, image_url, scraped_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_id) DO UPDATE SET
                site = excluded.site,
                name = excluded.name,
                url = excluded.url,
                price = excluded.price,
                color_name = excluded.color_name,
                color_code = excluded.color_code,
                image_urls = excluded.image_urls,
                image_count = excluded.image_count,
                image_url = excluded.image_url,
                scraped_at = excluded.scraped_at
            ",
        )
        .bind(&record.product_id)
        .bind(&self.site)
        .bind(&record.name)
        .bind(&record.url)
        .bind(&record.price)
        .bind(&record.color_name)
        .bind(&record.color_code)
        .bind(image_urls)
        .bind(i64::try_from(record.image_count)?)
        .bind(&record.image_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RecordSink for ProductStore {
    async fn emit(&self, record: &ProductRecord) -> Result<()> {
        self.save_product(record).await
    }
}
