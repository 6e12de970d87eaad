use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};

use crate::pagination::{self, Page};
use crate::{AppError, AppResult};

const SELECT_POST: &str = "SELECT p.id, p.title, p.body, p.timestamp, p.can_comment, p.category_id,
        c.name AS category_name,
        (SELECT COUNT(*) FROM comment m WHERE m.post_id = p.id AND m.reviewed = 1) AS comment_count
    FROM post p JOIN category c ON c.id = p.category_id";

/// A post joined with its category name and number of visible comments.
#[derive(FromRow, Serialize, Clone, Debug)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub timestamp: NaiveDateTime,
    pub can_comment: bool,
    pub category_id: i64,
    pub category_name: String,
    pub comment_count: i64,
}

#[derive(Debug)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub category_id: i64,
}

impl Post {
    /// All posts, newest first.
    pub async fn paginate(pool: &SqlitePool, page: u32, per_page: u32) -> AppResult<Page<Self>> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM post").fetch_one(pool).await?;
        let items = sqlx::query_as::<_, Self>(&format!(
            "{SELECT_POST} ORDER BY p.timestamp DESC, p.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(per_page))
        .bind(pagination::offset(page, per_page))
        .fetch_all(pool)
        .await?;
        Page::new(items, page, per_page, total)
    }

    pub async fn paginate_in_category(
        pool: &SqlitePool,
        category_id: i64,
        page: u32,
        per_page: u32,
    ) -> AppResult<Page<Self>> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM post WHERE category_id = ?")
            .bind(category_id)
            .fetch_one(pool)
            .await?;
        let items = sqlx::query_as::<_, Self>(&format!(
            "{SELECT_POST} WHERE p.category_id = ? ORDER BY p.timestamp DESC, p.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(category_id)
        .bind(i64::from(per_page))
        .bind(pagination::offset(page, per_page))
        .fetch_all(pool)
        .await?;
        Page::new(items, page, per_page, total)
    }

    pub async fn find<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Option<Self>> {
        let post = sqlx::query_as::<_, Self>(&format!("{SELECT_POST} WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(post)
    }

    pub async fn get<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Self> {
        Self::find(db, id).await?.ok_or(AppError::NotFound)
    }

    pub async fn create<'e>(db: impl SqliteExecutor<'e>, new: &NewPost<'_>) -> AppResult<i64> {
        Self::create_at(db, new, Utc::now().naive_utc()).await
    }

    /// Inserts a post with an explicit timestamp.
    pub async fn create_at<'e>(
        db: impl SqliteExecutor<'e>,
        new: &NewPost<'_>,
        timestamp: NaiveDateTime,
    ) -> AppResult<i64> {
        let id = sqlx::query("INSERT INTO post (title, body, timestamp, category_id) VALUES (?, ?, ?, ?)")
            .bind(new.title)
            .bind(new.body)
            .bind(timestamp)
            .bind(new.category_id)
            .execute(db)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    /// Edits title, body and category. The timestamp is kept.
    pub async fn update<'e>(db: impl SqliteExecutor<'e>, id: i64, new: &NewPost<'_>) -> AppResult<()> {
        let result = sqlx::query("UPDATE post SET title = ?, body = ?, category_id = ? WHERE id = ?")
            .bind(new.title)
            .bind(new.body)
            .bind(new.category_id)
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Deletes the post; its comments and their replies go with it.
    pub async fn delete<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM post WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Flips `can_comment` and returns the new value.
    pub async fn toggle_comment<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<bool> {
        let can_comment: Option<(bool,)> =
            sqlx::query_as("UPDATE post SET can_comment = NOT can_comment WHERE id = ? RETURNING can_comment")
                .bind(id)
                .fetch_optional(db)
                .await?;
        can_comment.map(|(value,)| value).ok_or(AppError::NotFound)
    }

    pub async fn ids<'e>(db: impl SqliteExecutor<'e>) -> AppResult<Vec<i64>> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM post").fetch_all(db).await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
