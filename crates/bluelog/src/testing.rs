//! Shared fixtures for the test modules.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use salvo::http::header::LOCATION;
use salvo::prelude::*;
use salvo::test::TestClient;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::mail::{Email, Mailer};
use crate::models::Category;
use crate::models::admin::NewAdmin;
use crate::state::AppState;
use crate::{AppResult, create_service, db};

/// Keeps every message instead of sending it.
#[derive(Debug, Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

#[salvo::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> AppResult<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits for the detached send tasks to deliver at least `count` messages.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<Email> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} mails, got {:?}", self.sent());
    }
}

/// Migrated in-memory database holding the default category.
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = db::connect(&Config::testing()).await.unwrap();
    db::migrate(&pool).await.unwrap();
    Category::ensure_default(&pool).await.unwrap();
    pool
}

pub(crate) struct TestApp {
    pub(crate) state: AppState,
    pub(crate) service: Service,
    pub(crate) mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub(crate) async fn new() -> Self {
        Self::with_config(Config::testing()).await
    }

    pub(crate) async fn with_config(config: Config) -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(config, mailer.clone()).await.unwrap();
        db::migrate(&state.db).await.unwrap();
        crate::models::Admin::create(
            &state.db,
            &NewAdmin {
                username: "admin",
                password: "helloflask",
                blog_title: "Blog Title",
                blog_sub_title: "Blog Subtitle",
                name: "Mima Kirigoe",
                about: "About me",
            },
        )
        .await
        .unwrap();
        Category::ensure_default(&state.db).await.unwrap();
        let service = create_service(state.clone()).unwrap();
        Self { state, service, mailer }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:5800{path}")
    }

    /// Logs in as the seeded admin and returns the `Cookie` header to replay.
    pub(crate) async fn login(&self) -> String {
        let res = TestClient::post(self.url("/auth/login"))
            .raw_form("username=admin&password=helloflask")
            .send(&self.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER));
        cookie_header(&res)
    }
}

/// `Cookie` request header carrying every cookie the response knows about.
pub(crate) fn cookie_header(res: &Response) -> String {
    res.cookies()
        .iter()
        .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn location(res: &Response) -> String {
    res.headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}
