
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};

use crate::pagination::{self, Page};
use crate::{AppError, AppResult};

const SELECT_COMMENT: &str = "SELECT m.id, m.author, m.email, m.site, m.body, m.timestamp,
        m.from_admin, m.reviewed, m.post_id, m.replied_id,
        p.title AS post_title,
        r.author AS replied_author, r.body AS replied_body, r.email AS replied_email
    FROM comment m
    JOIN post p ON p.id = m.post_id
    LEFT JOIN comment r ON r.id = m.replied_id";

#[derive(FromRow, Serialize, Clone, Debug)]
pub struct Comment {
    pub id: i64,
    pub author: String,
    pub email: String,
    pub site: Option<String>,
    pub body: String,
    pub timestamp: NaiveDateTime,
    pub from_admin: bool,
    pub reviewed: bool,
    pub post_id: i64,
    pub replied_id: Option<i64>,
    pub post_title: String,
    pub replied_author: Option<String>,
    pub replied_body: Option<String>,
    #[serde(skip_serializing)]
    pub replied_email: Option<String>,
}

/// Who wrote a comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommentAuthor {
    Visitor {
        author: String,
        email: String,
        site: Option<String>,
    },
    Admin {
        name: String,
        email: String,
    },
}

#[derive(Clone, Debug)]
pub struct NewComment {
    pub post_id: i64,
    pub author: CommentAuthor,
    pub body: String,
    pub replied_id: Option<i64>,
    /// Ignored for admin comments, which are always reviewed.
    pub reviewed: bool,
    pub timestamp: NaiveDateTime,
}

impl NewComment {
    pub fn new(
        post_id: i64,
        author: CommentAuthor,
        body: impl Into<String>,
        replied_id: Option<i64>,
    ) -> Self {
        Self {
            post_id,
            author,
            body: body.into(),
            replied_id,
            reviewed: false,
            timestamp: Utc::now().naive_utc(),
        }
    }
}

/// Moderation view filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentFilter {
    #[default]
    All,
    Unread,
    Admin,
}

impl CommentFilter {
    /// Reads the `filter` query value. Anything unrecognised shows every comment.
    #[must_use]
    pub fn from_query(raw: &str) -> Self {
        match raw {
            "unread" | "unreviewed" => Self::Unread,
            "admin" => Self::Admin,
            _ => Self::All,
        }
    }

    fn condition(self) -> &'static str {
        match self {
            Self::All => "1 = 1",
            Self::Unread => "m.reviewed = 0",
            Self::Admin => "m.from_admin = 1",
        }
    }
}

impl Comment {
    pub async fn find<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Option<Self>> {
        let comment = sqlx::query_as::<_, Self>(&format!("{SELECT_COMMENT} WHERE m.id = ?"))
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(comment)
    }

    pub async fn get<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Self> {
        Self::find(db, id).await?.ok_or(AppError::NotFound)
    }

    /// Stores a comment after checking the post accepts comments and the replied
    /// comment, if any, belongs to the same post.
    pub async fn submit(pool: &SqlitePool, new: &NewComment) -> AppResult<Self> {
        let mut tx = pool.begin().await?;

        let can_comment: Option<(bool,)> = sqlx::query_as("SELECT can_comment FROM post WHERE id = ?")
            .bind(new.post_id)
            .fetch_optional(&mut *tx)
            .await?;
        match can_comment {
            None => return Err(AppError::NotFound),
            Some((false,)) => return Err(AppError::CommentsDisabled),
            Some((true,)) => {}
        }

        if let Some(replied_id) = new.replied_id {
            let parent: Option<(i64,)> = sqlx::query_as("SELECT post_id FROM comment WHERE id = ?")
                .bind(replied_id)
                .fetch_optional(&mut *tx)
                .await?;
            match parent {
                None => return Err(AppError::NotFound),
                Some((post_id,)) if post_id != new.post_id => {
                    return Err(AppError::bad_request("replied comment belongs to another post"));
                }
                Some(_) => {}
            }
        }

        let (author, email, site, from_admin) = match &new.author {
            CommentAuthor::Visitor { author, email, site } => {
                (author.as_str(), email.as_str(), site.as_deref(), false)
            }
            CommentAuthor::Admin { name, email } => (name.as_str(), email.as_str(), Some("/"), true),
        };
        let id = sqlx::query(
            "INSERT INTO comment (author, email, site, body, from_admin, reviewed, timestamp, replied_id, post_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(author)
        .bind(email)
        .bind(site)
        .bind(&new.body)
        .bind(from_admin)
        .bind(from_admin || new.reviewed)
        .bind(new.timestamp)
        .bind(new.replied_id)
        .bind(new.post_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let comment = Self::get(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(comment)
    }

    /// Reviewed comments of a post, oldest first.
    pub async fn approved_for_post(
        pool: &SqlitePool,
        post_id: i64,
        page: u32,
        per_page: u32,
    ) -> AppResult<Page<Self>> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comment WHERE post_id = ? AND reviewed = 1")
            .bind(post_id)
            .fetch_one(pool)
            .await?;
        let items = sqlx::query_as::<_, Self>(&format!(
            "{SELECT_COMMENT} WHERE m.post_id = ? AND m.reviewed = 1
             ORDER BY m.timestamp ASC, m.id ASC LIMIT ? OFFSET ?"
        ))
        .bind(post_id)
        .bind(i64::from(per_page))
        .bind(pagination::offset(page, per_page))
        .fetch_all(pool)
        .await?;
        Page::new(items, page, per_page, total)
    }

    /// Moderation listing, newest first.
    pub async fn filtered(
        pool: &SqlitePool,
        filter: CommentFilter,
        page: u32,
        per_page: u32,
    ) -> AppResult<Page<Self>> {
        let condition = filter.condition();
        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM comment m WHERE {condition}"))
            .fetch_one(pool)
            .await?;
        let items = sqlx::query_as::<_, Self>(&format!(
            "{SELECT_COMMENT} WHERE {condition} ORDER BY m.timestamp DESC, m.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(per_page))
        .bind(pagination::offset(page, per_page))
        .fetch_all(pool)
        .await?;
        Page::new(items, page, per_page, total)
    }

    /// Marks the comment reviewed. Approving twice is harmless.
    pub async fn approve<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<()> {
        let result = sqlx::query("UPDATE comment SET reviewed = 1 WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Deletes the comment and every reply below it.
    pub async fn delete<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM comment WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub async fn count_unreviewed<'e>(db: impl SqliteExecutor<'e>) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comment WHERE reviewed = 0")
            .fetch_one(db)
            .await?;
        Ok(count)
    }

    pub async fn ids<'e>(db: impl SqliteExecutor<'e>) -> AppResult<Vec<(i64, i64)>> {
        let ids = sqlx::query_as("SELECT id, post_id FROM comment").fetch_all(db).await?;
        Ok(ids)
    }
}
