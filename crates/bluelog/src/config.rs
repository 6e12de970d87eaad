//! Application configuration.
//!
//! Values come from the process environment (optionally seeded from a `.env` file by
//! [`dotenvy`]). The active profile is picked with `BLUELOG_CONFIG` and decides the
//! defaults that are not overridden by a variable.

use std::env;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};

use crate::{AppError, AppResult};

/// Name of the theme used when the visitor has not picked one.
pub const DEFAULT_THEME: &str = "perfect_blue";

/// Deployment profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Development,
    Testing,
    Production,
}

impl FromStr for Profile {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "testing" | "test" => Ok(Self::Testing),
            "production" | "prod" => Ok(Self::Production),
            other => Err(AppError::Config(format!("unknown profile `{other}`"))),
        }
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        };
        f.write_str(name)
    }
}

/// A selectable stylesheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub name: &'static str,
    pub label: &'static str,
}

/// Outgoing mail settings.
#[derive(Clone, Debug, Default)]
pub struct MailConfig {
    /// SMTP relay. When unset, messages are only logged.
    pub server: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender_name: String,
}

impl MailConfig {
    /// Address used in the `From` header.
    #[must_use]
    pub fn sender(&self) -> Option<String> {
        self.username
            .as_ref()
            .map(|address| format!("{} <{address}>", self.sender_name))
    }
}

/// Runtime configuration shared by every request.
#[derive(Clone, Debug)]
pub struct Config {
    pub profile: Profile,
    pub secret_key: String,
    pub database_url: String,
    pub listen_addr: String,
    /// Absolute base used for links in outgoing mail.
    pub base_url: String,
    pub mail: MailConfig,
    /// Address of the blog owner, receives new comment notifications.
    pub admin_email: String,
    pub post_per_page: u32,
    pub manage_post_per_page: u32,
    pub comment_per_page: u32,
    pub themes: Vec<Theme>,
    pub slow_query_threshold: Duration,
    pub upload_path: PathBuf,
    /// Directory holding the Tera templates, relative to the working directory unless absolute.
    pub template_path: PathBuf,
    pub static_path: PathBuf,
    pub allowed_image_extensions: Vec<&'static str>,
    pub csrf_enabled: bool,
}

impl Config {
    /// Defaults for `profile`, without reading the environment.
    #[must_use]
    pub fn for_profile(profile: Profile) -> Self {
        let database_url = match profile {
            Profile::Development => "sqlite://data-dev.db",
            Profile::Testing => "sqlite::memory:",
            Profile::Production => "sqlite://data.db",
        };
        let listen_addr = "127.0.0.1:5800".to_owned();
        Self {
            profile,
            secret_key: "dev key".to_owned(),
            database_url: database_url.to_owned(),
            base_url: format!("http://{listen_addr}"),
            listen_addr,
            mail: MailConfig {
                server: None,
                port: 465,
                username: None,
                password: None,
                sender_name: "Bluelog Admin".to_owned(),
            },
            admin_email: "admin@example.com".to_owned(),
            post_per_page: 10,
            manage_post_per_page: 15,
            comment_per_page: 15,
            themes: vec![
                Theme {
                    name: "perfect_blue",
                    label: "Perfect Blue",
                },
                Theme {
                    name: "black_swan",
                    label: "Black Swan",
                },
            ],
            slow_query_threshold: Duration::from_secs(1),
            upload_path: PathBuf::from("uploads"),
            template_path: PathBuf::from("templates"),
            static_path: PathBuf::from("static"),
            allowed_image_extensions: vec!["png", "jpg", "jpeg", "gif"],
            csrf_enabled: profile != Profile::Testing,
        }
    }

    /// Configuration used by the test-suite: in-memory database, no CSRF.
    #[must_use]
    pub fn testing() -> Self {
        Self::for_profile(Profile::Testing)
    }

    /// Reads the configuration from the environment.
    pub fn from_env() -> AppResult<Self> {
        // A missing `.env` file is fine, the real environment still applies.
        dotenvy::dotenv().ok();

        let profile = match env::var("BLUELOG_CONFIG") {
            Ok(value) => value.parse()?,
            Err(_) => Profile::Development,
        };
        let mut config = Self::for_profile(profile);

        if let Ok(value) = env::var("SECRET_KEY") {
            config.secret_key = value;
        }
        if let Ok(value) = env::var("DATABASE_URL") {
            config.database_url = value;
        }
        if let Ok(value) = env::var("BLUELOG_LISTEN") {
            config.base_url = format!("http://{value}");
            config.listen_addr = value;
        }
        if let Ok(value) = env::var("BLUELOG_BASE_URL") {
            config.base_url = value.trim_end_matches('/').to_owned();
        }
        if let Ok(value) = env::var("BLUELOG_EMAIL") {
            config.admin_email = value;
        }
        if let Ok(value) = env::var("BLUELOG_UPLOAD_PATH") {
            config.upload_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("BLUELOG_TEMPLATES") {
            config.template_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("BLUELOG_STATIC") {
            config.static_path = PathBuf::from(value);
        }
        config.mail.server = env::var("MAIL_SERVER").ok().filter(|s| !s.is_empty());
        config.mail.username = env::var("MAIL_USERNAME").ok();
        config.mail.password = env::var("MAIL_PASSWORD").ok();
        if let Ok(value) = env::var("MAIL_PORT") {
            config.mail.port = value
                .parse()
                .map_err(|_| AppError::Config(format!("invalid MAIL_PORT `{value}`")))?;
        }
        Ok(config)
    }

    /// 64 byte key signing the session cookie.
    #[must_use]
    pub fn session_key(&self) -> [u8; 64] {
        Sha512::digest(self.secret_key.as_bytes()).into()
    }

    /// 32 byte key for the CSRF token cipher.
    #[must_use]
    pub fn csrf_key(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"bluelog.csrf.");
        hasher.update(self.secret_key.as_bytes());
        hasher.finalize().into()
    }

    #[must_use]
    pub fn theme(&self, name: &str) -> Option<&Theme> {
        self.themes.iter().find(|theme| theme.name == name)
    }

    /// Whether `filename` carries one of the accepted image extensions.
    #[must_use]
    pub fn is_allowed_image(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.allowed_image_extensions.contains(&ext.as_str()))
    }
}
