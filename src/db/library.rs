//! Local-ownership index and ranking feed tables.
//!
//! The filesystem scanner and the ranking crawler write these tables; the
//! orchestrator only reads them through [`crate::library`].

use crate::error::DatabaseError;
use crate::types::FeedItem;
use crate::{Error, Result};

use super::{Database, RankingEntry};

impl Database {
    /// Whether the library contains `code`
    pub async fn library_contains(&self, code: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM library_items WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to check library: {}",
                    e
                )))
            })?;

        Ok(found.is_some())
    }

    /// Record an item found in the library
    pub async fn add_library_item(&self, code: &str, path: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO library_items (code, path, added_at) VALUES (?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET path = excluded.path
            "#,
        )
        .bind(code)
        .bind(path)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to add library item: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Forget an item removed from the library
    pub async fn remove_library_item(&self, code: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM library_items WHERE code = ?")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to remove library item: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a category's ranking with `entries`
    pub async fn replace_rankings(&self, category: &str, entries: &[RankingEntry]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        sqlx::query("DELETE FROM rankings WHERE category = ?")
            .bind(category)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear rankings: {}",
                    e
                )))
            })?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO rankings (category, code, title, cover_url, position, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(category, code) DO UPDATE SET
                    title = excluded.title,
                    cover_url = excluded.cover_url,
                    position = MIN(position, excluded.position),
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(category)
            .bind(&entry.code)
            .bind(&entry.title)
            .bind(&entry.cover_url)
            .bind(entry.position)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert ranking: {}",
                    e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit rankings: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Top `limit` ranked items of a category, with library ownership resolved
    pub async fn list_rankings(&self, category: &str, limit: i64) -> Result<Vec<FeedItem>> {
        let rows: Vec<(String, String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT r.code, r.title, r.cover_url,
                   EXISTS(SELECT 1 FROM library_items l WHERE l.code = r.code)
            FROM rankings r
            WHERE r.category = ?
            ORDER BY r.position ASC
            LIMIT ?
            "#,
        )
        .bind(category)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list rankings: {}",
                e
            )))
        })?;

        Ok(rows
            .into_iter()
            .map(|(code, title, cover_url, owned)| FeedItem {
                code,
                title,
                cover_url,
                locally_owned: owned != 0,
            })
            .collect())
    }
}
