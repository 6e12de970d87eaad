use salvo::http::StatusCode;
use salvo::prelude::*;
use thiserror::Error;

/// Result alias used across the crate.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("resource not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("comments are disabled for this post")]
    CommentsDisabled,
    #[error("the default category can not be changed")]
    ProtectedCategory,
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migrate: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("template: {0}")]
    Template(#[from] tera::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("password: {0}")]
    Password(String),
    #[error("mail: {0}")]
    Mail(String),
    #[error("config: {0}")]
    Config(String),
    #[error("session: {0}")]
    Session(String),
}

impl AppError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::CommentsDisabled | Self::ProtectedCategory => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::Password(e.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(e: lettre::error::Error) -> Self {
        Self::Mail(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        Self::Mail(e.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(e: lettre::address::AddressError) -> Self {
        Self::Mail(e.to_string())
    }
}

impl From<salvo::http::ParseError> for AppError {
    fn from(e: salvo::http::ParseError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

/// Only the status is written here, the body is left to the error page catcher.
#[async_trait]
impl Writer for AppError {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        let code = self.status_code();
        if code.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        res.status_code(code);
    }
}
