use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use nf_core::storage::{ArticleId, PersistenceGateway, SaveOutcome};
use nf_core::{Error, ProcessedArticle, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS article (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        body TEXT,
        language TEXT NOT NULL,
        translated INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_category (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER NOT NULL REFERENCES article(id),
        category TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_image (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER NOT NULL REFERENCES article(id),
        image_url TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_source (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER NOT NULL REFERENCES article(id),
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        press_company TEXT NOT NULL,
        fetched_at TEXT NOT NULL
    )
    "#,
];

fn storage_error(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Storage(format!("{context}: {e}"))
}

/// Relational store: one `article` row per singleton or group, one
/// `article_source` row per member URL.
pub struct SqliteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(storage_error("failed to open database"))?;

        for migration in MIGRATIONS {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(storage_error("failed to run migration"))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn article_count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM article")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("failed to count articles"))
    }

    pub async fn source_urls(&self, article_id: ArticleId) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT url FROM article_source WHERE article_id = ? ORDER BY id",
        )
        .bind(article_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("failed to read sources"))
    }

    /// Writes the article record and its sources inside `tx`. Returns `None`
    /// when a member URL is already stored; the caller rolls back.
    async fn insert_article(
        tx: &mut Transaction<'_, Sqlite>,
        representative: &ProcessedArticle,
        members: &[ProcessedArticle],
    ) -> Result<Option<ArticleId>> {
        for member in members {
            let known = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM article_source WHERE url = ?",
            )
            .bind(&member.url)
            .fetch_one(&mut **tx)
            .await
            .map_err(storage_error("failed to check source url"))?;
            if known > 0 {
                return Ok(None);
            }
        }

        let now = Utc::now().to_rfc3339();
        let id = sqlx::query(
            "INSERT INTO article (title, body, language, translated, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&representative.title)
        .bind(&representative.body_text)
        .bind(&representative.language)
        .bind(representative.translated)
        .bind(&now)
        .execute(&mut **tx)
        .await
        .map_err(storage_error("failed to insert article"))?
        .last_insert_rowid();

        sqlx::query("INSERT INTO article_category (article_id, category) VALUES (?, ?)")
            .bind(id)
            .bind(&representative.category)
            .execute(&mut **tx)
            .await
            .map_err(storage_error("failed to insert category"))?;

        if let Some(image_url) = representative.image_url.as_deref().filter(|u| !u.is_empty()) {
            sqlx::query("INSERT INTO article_image (article_id, image_url) VALUES (?, ?)")
                .bind(id)
                .bind(image_url)
                .execute(&mut **tx)
                .await
                .map_err(storage_error("failed to insert image"))?;
        }

        for member in members {
            let inserted = sqlx::query(
                "INSERT INTO article_source (article_id, title, url, press_company, fetched_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&member.title)
            .bind(&member.url)
            .bind(&member.source_name)
            .bind(member.fetched_at.to_rfc3339())
            .execute(&mut **tx)
            .await;
            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => return Ok(None),
                Err(e) => return Err(storage_error("failed to insert source")(e)),
            }
        }

        Ok(Some(ArticleId(id)))
    }

    async fn save(
        &self,
        representative: &ProcessedArticle,
        members: &[ProcessedArticle],
    ) -> Result<SaveOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("failed to begin transaction"))?;

        match Self::insert_article(&mut tx, representative, members).await {
            Ok(Some(id)) => {
                tx.commit()
                    .await
                    .map_err(storage_error("failed to commit"))?;
                debug!(article_id = %id, sources = members.len(), "Stored article");
                Ok(SaveOutcome::Created(id))
            }
            Ok(None) => {
                tx.rollback()
                    .await
                    .map_err(storage_error("failed to roll back"))?;
                Ok(SaveOutcome::AlreadyExists)
            }
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(storage_error("failed to roll back"))?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PersistenceGateway for SqliteStorage {
    async fn exists_by_url(&self, url: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM article_source WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("failed to look up url"))?;
        Ok(count > 0)
    }

    async fn save_singleton(&self, article: &ProcessedArticle) -> Result<SaveOutcome> {
        self.save(article, std::slice::from_ref(article)).await
    }

    async fn save_story_group(
        &self,
        representative: &ProcessedArticle,
        members: &[ProcessedArticle],
    ) -> Result<SaveOutcome> {
        self.save(representative, members).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn article(url: &str) -> ProcessedArticle {
        ProcessedArticle {
            url: url.to_string(),
            title: format!("Headline {url}"),
            body_text: "정부가 오늘 새로운 정책을 발표했다.".to_string(),
            image_url: None,
            source_name: "yonhap".to_string(),
            category: "politics".to_string(),
            fetched_at: Utc::now(),
            language: "ko".to_string(),
            translated: false,
        }
    }

    #[tokio::test]
    async fn stores_singletons_and_groups() {
        let temp_dir = tempdir().unwrap();
        let storage = SqliteStorage::new_with_path(&temp_dir.path().join("nested/news.db"))
            .await
            .unwrap();

        let single = article("https://a.example/1");
        assert!(matches!(
            storage.save_singleton(&single).await.unwrap(),
            SaveOutcome::Created(_)
        ));
        assert!(storage.exists_by_url(&single.url).await.unwrap());

        let members = vec![article("https://a.example/2"), article("https://b.example/2")];
        let id = storage
            .save_story_group(&members[0], &members)
            .await
            .unwrap()
            .id()
            .unwrap();
        assert_eq!(
            storage.source_urls(id).await.unwrap(),
            ["https://a.example/2", "https://b.example/2"]
        );
        assert_eq!(storage.article_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn conflicting_group_rolls_back() {
        let temp_dir = tempdir().unwrap();
        let storage = SqliteStorage::new_with_path(&temp_dir.path().join("news.db"))
            .await
            .unwrap();
        storage
            .save_singleton(&article("https://b.example/1"))
            .await
            .unwrap();

        let members = vec![article("https://a.example/1"), article("https://b.example/1")];
        assert_eq!(
            storage.save_story_group(&members[0], &members).await.unwrap(),
            SaveOutcome::AlreadyExists
        );
        assert!(!storage.exists_by_url("https://a.example/1").await.unwrap());
        assert_eq!(storage.article_count().await.unwrap(), 1);
    }
}
