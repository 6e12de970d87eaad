use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

use crate::AppResult;

/// The blog owner. There is at most one row.
#[derive(FromRow, Serialize, Clone, Debug)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub blog_title: String,
    pub blog_sub_title: String,
    pub name: String,
    pub about: String,
}

#[derive(Debug)]
pub struct NewAdmin<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub blog_title: &'a str,
    pub blog_sub_title: &'a str,
    pub name: &'a str,
    pub about: &'a str,
}

/// Editable blog settings.
#[derive(Debug)]
pub struct Settings<'a> {
    pub name: &'a str,
    pub blog_title: &'a str,
    pub blog_sub_title: &'a str,
    pub about: &'a str,
}

impl Admin {
    pub async fn first<'e>(db: impl SqliteExecutor<'e>) -> AppResult<Option<Self>> {
        let admin = sqlx::query_as::<_, Self>("SELECT * FROM admin ORDER BY id LIMIT 1")
            .fetch_optional(db)
            .await?;
        Ok(admin)
    }

    pub async fn find<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Option<Self>> {
        let admin = sqlx::query_as::<_, Self>("SELECT * FROM admin WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(admin)
    }

    pub async fn create<'e>(db: impl SqliteExecutor<'e>, new: &NewAdmin<'_>) -> AppResult<i64> {
        let password_hash = hash_password(new.password)?;
        let id = sqlx::query(
            "INSERT INTO admin (username, password_hash, blog_title, blog_sub_title, name, about)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new.username)
        .bind(password_hash)
        .bind(new.blog_title)
        .bind(new.blog_sub_title)
        .bind(new.name)
        .bind(new.about)
        .execute(db)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn update_settings<'e>(
        db: impl SqliteExecutor<'e>,
        id: i64,
        settings: &Settings<'_>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE admin SET name = ?, blog_title = ?, blog_sub_title = ?, about = ? WHERE id = ?")
            .bind(settings.name)
            .bind(settings.blog_title)
            .bind(settings.blog_sub_title)
            .bind(settings.about)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Replaces the login name and password of an existing admin.
    pub async fn set_credentials<'e>(
        db: impl SqliteExecutor<'e>,
        id: i64,
        username: &str,
        password: &str,
    ) -> AppResult<()> {
        let password_hash = hash_password(password)?;
        sqlx::query("UPDATE admin SET username = ?, password_hash = ? WHERE id = ?")
            .bind(username)
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn validate_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// A malformed stored hash never verifies.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("helloflask").unwrap();
        assert_ne!(hash, "helloflask");
        assert!(verify_password("helloflask", &hash));
        assert!(!verify_password("hellodjango", &hash));
        assert!(!verify_password("helloflask", "not a hash"));
    }
}
