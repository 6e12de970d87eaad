use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

use crate::{AppError, AppResult};

/// Sidebar link.
#[derive(FromRow, Serialize, Clone, Debug)]
pub struct Link {
    pub id: i64,
    pub name: String,
    pub url: String,
}

impl Link {
    pub async fn all<'e>(db: impl SqliteExecutor<'e>) -> AppResult<Vec<Self>> {
        let links = sqlx::query_as::<_, Self>("SELECT id, name, url FROM link ORDER BY name, id")
            .fetch_all(db)
            .await?;
        Ok(links)
    }

    pub async fn get<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Self> {
        sqlx::query_as::<_, Self>("SELECT id, name, url FROM link WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn create<'e>(db: impl SqliteExecutor<'e>, name: &str, url: &str) -> AppResult<i64> {
        let id = sqlx::query("INSERT INTO link (name, url) VALUES (?, ?)")
            .bind(name)
            .bind(url)
            .execute(db)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn update<'e>(db: impl SqliteExecutor<'e>, id: i64, name: &str, url: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE link SET name = ?, url = ? WHERE id = ?")
            .bind(name)
            .bind(url)
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub async fn delete<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM link WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
