//! SQLite-backed bookmark repository

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

use super::traits::BookmarkRepository;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Bookmark, NewBookmark};

const SELECT_COLUMNS: &str = "SELECT id, url, title, tags, description, favicon_url, favicon_local, created_at, updated_at FROM bookmarks";

#[derive(Clone)]
pub struct SqliteBookmarkRepository {
    pool: Pool<Sqlite>,
}

// Timestamps are written as RFC3339 but tolerate SQLite's native format
fn parse_datetime(field: &str, s: &str) -> RepositoryResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    Err(RepositoryError::InvalidValue {
        field: field.to_string(),
        message: format!("unparseable timestamp {s:?}"),
    })
}

fn row_to_bookmark(row: &SqliteRow) -> RepositoryResult<Bookmark> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Bookmark {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        tags: row.try_get("tags")?,
        desc: row.try_get("description")?,
        favicon_url: row.try_get("favicon_url")?,
        favicon_local: row.try_get("favicon_local")?,
        created_at: parse_datetime("created_at", &created_at)?,
        updated_at: parse_datetime("updated_at", &updated_at)?,
    })
}

impl SqliteBookmarkRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookmarkRepository for SqliteBookmarkRepository {
    async fn all(&self) -> RepositoryResult<Vec<Bookmark>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_bookmark).collect()
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Bookmark>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_bookmark).transpose()
    }

    async fn insert_one(&self, bookmark: &NewBookmark) -> RepositoryResult<i64> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let result = sqlx::query(
            r#"
            INSERT INTO bookmarks (url, title, tags, description, favicon_url, favicon_local, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&bookmark.url)
        .bind(&bookmark.title)
        .bind(&bookmark.tags)
        .bind(&bookmark.desc)
        .bind(&bookmark.favicon_url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepositoryError::ConstraintViolation {
                    constraint: "bookmarks.url".to_string(),
                    message: format!("bookmark already exists: {}", bookmark.url),
                }
            }
            other => RepositoryError::Database(other),
        })?;

        let id = result.last_insert_rowid();
        debug!("Inserted bookmark {} ({})", id, bookmark.url);
        Ok(id)
    }

    async fn update_one(&self, bookmark: &Bookmark) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookmarks
            SET url = ?, title = ?, tags = ?, description = ?, favicon_url = ?, favicon_local = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&bookmark.url)
        .bind(&bookmark.title)
        .bind(&bookmark.tags)
        .bind(&bookmark.desc)
        .bind(&bookmark.favicon_url)
        .bind(&bookmark.favicon_local)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(bookmark.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::bookmark_not_found(bookmark.id));
        }
        Ok(())
    }

    async fn count(&self) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;
    use std::time::Duration;

    async fn repo() -> SqliteBookmarkRepository {
        let db = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout: Duration::from_secs(1),
        })
        .await
        .unwrap();
        db.migrate().await.unwrap();
        SqliteBookmarkRepository::new(db.pool())
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repo().await;
        let mut new = NewBookmark::new("https://example.com/page");
        new.title = "Example".to_string();
        let id = repo.insert_one(&new).await.unwrap();

        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.url, "https://example.com/page");
        assert_eq!(found.title, "Example");
        assert!(found.favicon_url.is_none());
        assert!(found.favicon_local.is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_url_is_constraint_violation() {
        let repo = repo().await;
        repo.insert_one(&NewBookmark::new("https://example.com"))
            .await
            .unwrap();
        let err = repo
            .insert_one(&NewBookmark::new("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_one_persists_favicon_fields() {
        let repo = repo().await;
        let id = repo
            .insert_one(&NewBookmark::new("https://example.com"))
            .await
            .unwrap();

        let mut b = repo.find_by_id(id).await.unwrap().unwrap();
        b.favicon_url = Some("https://example.com/favicon.ico".to_string());
        repo.update_one(&b).await.unwrap();

        let reloaded = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(
            reloaded.favicon_url.as_deref(),
            Some("https://example.com/favicon.ico")
        );
    }

    #[tokio::test]
    async fn test_update_one_on_deleted_record_fails() {
        let repo = repo().await;
        let ghost = Bookmark::new(42, "https://gone.example");
        let err = repo.update_one(&ghost).await.unwrap_err();
        assert!(matches!(err, RepositoryError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_all_is_newest_first() {
        let repo = repo().await;
        let first = repo
            .insert_one(&NewBookmark::new("https://a.example"))
            .await
            .unwrap();
        let second = repo
            .insert_one(&NewBookmark::new("https://b.example"))
            .await
            .unwrap();

        let all = repo.all().await.unwrap();
        let ids: Vec<i64> = all.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second, first]);
    }
}
