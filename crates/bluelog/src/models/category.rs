use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};

use crate::{AppError, AppResult};

/// Posts of a deleted category move here. It can never be renamed or deleted.
pub const DEFAULT_CATEGORY_ID: i64 = 1;
pub const DEFAULT_CATEGORY_NAME: &str = "Default";

#[derive(FromRow, Serialize, Clone, Debug)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A category together with the number of posts filed under it.
#[derive(FromRow, Serialize, Clone, Debug)]
pub struct CategoryWithCount {
    pub id: i64,
    pub name: String,
    pub post_count: i64,
}

impl Category {
    pub async fn all<'e>(db: impl SqliteExecutor<'e>) -> AppResult<Vec<Self>> {
        let categories = sqlx::query_as::<_, Self>("SELECT id, name FROM category ORDER BY name, id")
            .fetch_all(db)
            .await?;
        Ok(categories)
    }

    pub async fn all_with_counts<'e>(db: impl SqliteExecutor<'e>) -> AppResult<Vec<CategoryWithCount>> {
        let categories = sqlx::query_as::<_, CategoryWithCount>(
            "SELECT c.id, c.name, COUNT(p.id) AS post_count
             FROM category c LEFT JOIN post p ON p.category_id = c.id
             GROUP BY c.id, c.name
             ORDER BY c.name, c.id",
        )
        .fetch_all(db)
        .await?;
        Ok(categories)
    }

    pub async fn find<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Option<Self>> {
        let category = sqlx::query_as::<_, Self>("SELECT id, name FROM category WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(category)
    }

    pub async fn find_by_name<'e>(db: impl SqliteExecutor<'e>, name: &str) -> AppResult<Option<Self>> {
        let category = sqlx::query_as::<_, Self>("SELECT id, name FROM category WHERE name = ?")
            .bind(name)
            .fetch_optional(db)
            .await?;
        Ok(category)
    }

    /// Inserts a category. A duplicate name surfaces as a unique violation from the store.
    pub async fn create<'e>(db: impl SqliteExecutor<'e>, name: &str) -> AppResult<i64> {
        let id = sqlx::query("INSERT INTO category (name) VALUES (?)")
            .bind(name)
            .execute(db)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    /// Creates the default category unless it already exists.
    pub async fn ensure_default<'e>(db: impl SqliteExecutor<'e>) -> AppResult<()> {
        sqlx::query("INSERT OR IGNORE INTO category (id, name) VALUES (?, ?)")
            .bind(DEFAULT_CATEGORY_ID)
            .bind(DEFAULT_CATEGORY_NAME)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn rename<'e>(db: impl SqliteExecutor<'e>, id: i64, name: &str) -> AppResult<()> {
        if id == DEFAULT_CATEGORY_ID {
            return Err(AppError::ProtectedCategory);
        }
        let result = sqlx::query("UPDATE category SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Moves every post of the category to the default one, then deletes the category,
    /// both in a single transaction.
    pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<()> {
        if id == DEFAULT_CATEGORY_ID {
            return Err(AppError::ProtectedCategory);
        }
        let mut tx = pool.begin().await?;
        let moved = sqlx::query("UPDATE post SET category_id = ? WHERE category_id = ?")
            .bind(DEFAULT_CATEGORY_ID)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM category WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound);
        }
        tx.commit().await?;
        tracing::info!(category = id, moved, "category deleted");
        Ok(())
    }
}

/// True when `err` is the store rejecting a duplicate value.
#[must_use]
pub fn is_unique_violation(err: &AppError) -> bool {
    match err {
        AppError::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::{NewPost, Post};
    use crate::testing::test_pool;

    #[tokio::test]
    async fn test_delete_reassigns_posts() {
        let pool = test_pool().await;
        let travel = Category::create(&pool, "Travel").await.unwrap();
        let post = Post::create(
            &pool,
            &NewPost {
                title: "Lisbon",
                body: "<p>Trams.</p>",
                category_id: travel,
            },
        )
        .await
        .unwrap();

        Category::delete(&pool, travel).await.unwrap();

        assert!(Category::find(&pool, travel).await.unwrap().is_none());
        let post = Post::find(&pool, post).await.unwrap().unwrap();
        assert_eq!(post.category_id, DEFAULT_CATEGORY_ID);
        let (orphans,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM post WHERE category_id NOT IN (SELECT id FROM category)",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_default_category_is_protected() {
        let pool = test_pool().await;
        assert!(matches!(
            Category::delete(&pool, DEFAULT_CATEGORY_ID).await,
            Err(AppError::ProtectedCategory)
        ));
        assert!(matches!(
            Category::rename(&pool, DEFAULT_CATEGORY_ID, "Misc").await,
            Err(AppError::ProtectedCategory)
        ));
        let default = Category::find(&pool, DEFAULT_CATEGORY_ID).await.unwrap().unwrap();
        assert_eq!(default.name, DEFAULT_CATEGORY_NAME);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let pool = test_pool().await;
        Category::create(&pool, "Rust").await.unwrap();
        let err = Category::create(&pool, "Rust").await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_missing_category() {
        let pool = test_pool().await;
        assert!(matches!(Category::delete(&pool, 42).await, Err(AppError::NotFound)));
        assert!(matches!(Category::rename(&pool, 42, "x").await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_counts() {
        let pool = test_pool().await;
        let id = Category::create(&pool, "Books").await.unwrap();
        for title in ["One", "Two"] {
            Post::create(
                &pool,
                &NewPost {
                    title,
                    body: "body",
                    category_id: id,
                },
            )
            .await
            .unwrap();
        }
        let counts = Category::all_with_counts(&pool).await.unwrap();
        let books = counts.iter().find(|c| c.id == id).unwrap();
        assert_eq!(books.post_count, 2);
        let default = counts.iter().find(|c| c.id == DEFAULT_CATEGORY_ID).unwrap();
        assert_eq!(default.post_count, 0);
    }
}
