//! Setup tasks run from the command line.

use sqlx::SqlitePool;

use crate::models::admin::NewAdmin;
use crate::models::{Admin, Category};
use crate::{AppResult, db};

/// Creates the schema, dropping every table first when `drop` is set.
pub async fn initdb(pool: &SqlitePool, drop: bool) -> AppResult<()> {
    if drop {
        db::drop_all(pool).await?;
        tracing::info!("dropped all tables");
    }
    db::migrate(pool).await?;
    tracing::info!("initialized database");
    Ok(())
}

/// Creates the admin account, or resets its credentials when one exists, and
/// makes sure the default category is there.
pub async fn init(pool: &SqlitePool, username: &str, password: &str) -> AppResult<()> {
    db::migrate(pool).await?;
    match Admin::first(pool).await? {
        Some(admin) => {
            Admin::set_credentials(pool, admin.id, username, password).await?;
            tracing::info!(username, "administrator updated");
        }
        None => {
            Admin::create(
                pool,
                &NewAdmin {
                    username,
                    password,
                    blog_title: "Bluelog",
                    blog_sub_title: "No, I'm the real thing.",
                    name: "Admin",
                    about: "Anything about you.",
                },
            )
            .await?;
            tracing::info!(username, "administrator created");
        }
    }
    Category::ensure_default(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::DEFAULT_CATEGORY_ID;

    #[tokio::test]
    async fn test_init_creates_then_updates() {
        let pool = db::connect(&Config::testing()).await.unwrap();
        initdb(&pool, false).await.unwrap();

        init(&pool, "grey", "first-pass").await.unwrap();
        let admin = Admin::first(&pool).await.unwrap().unwrap();
        assert_eq!(admin.username, "grey");
        assert!(admin.validate_password("first-pass"));
        assert!(Category::find(&pool, DEFAULT_CATEGORY_ID).await.unwrap().is_some());

        init(&pool, "li", "second-pass").await.unwrap();
        let updated = Admin::first(&pool).await.unwrap().unwrap();
        assert_eq!(updated.id, admin.id);
        assert_eq!(updated.username, "li");
        assert!(updated.validate_password("second-pass"));
        assert_eq!(Category::all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_initdb_drop_clears_rows() {
        let pool = db::connect(&Config::testing()).await.unwrap();
        initdb(&pool, false).await.unwrap();
        Category::ensure_default(&pool).await.unwrap();
        initdb(&pool, true).await.unwrap();
        assert!(Category::all(&pool).await.unwrap().is_empty());
    }
}
