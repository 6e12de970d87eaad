//! Bluelog, a personal blog with threaded comments, moderation and a small
//! admin back-office, served by salvo.

use salvo::affix_state;
use salvo::catcher::Catcher;
use salvo::logging::Logger;
use salvo::prelude::*;

pub mod auth;
pub mod catcher;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fakes;
pub mod forms;
pub mod mail;
pub mod models;
pub mod pagination;
pub mod render;
pub mod routes;
pub mod state;
pub mod utils;

#[cfg(test)]
mod testing;

pub use error::{AppError, AppResult};
pub use state::AppState;

/// The whole application. State is injected at service level so error pages can
/// render even for unmatched routes.
pub fn create_service(state: AppState) -> AppResult<Service> {
    let router = routes::router(&state.config)?;
    Ok(Service::new(router)
        .hoop(Logger::new())
        .hoop(affix_state::inject(state))
        .catcher(Catcher::default().hoop(catcher::error_page)))
}

/// Binds the configured address and serves until the process is stopped.
pub async fn serve(state: AppState) -> AppResult<()> {
    let listen_addr = state.config.listen_addr.clone();
    let service = create_service(state)?;
    tracing::info!("listening on http://{listen_addr}");
    let acceptor = TcpListener::new(listen_addr).bind().await;
    Server::new(acceptor).serve(service).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};

    use crate::config::Config;
    use crate::testing::TestApp;

    use super::*;

    #[tokio::test]
    async fn test_csrf_rejection_renders_bad_request() {
        let mut config = Config::testing();
        config.csrf_enabled = true;
        let app = TestApp::with_config(config).await;

        let mut res = TestClient::post(app.url("/auth/login"))
            .raw_form("username=admin&password=helloflask")
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
        let body = res.take_string().await.unwrap();
        assert!(body.contains("The CSRF token is missing or invalid."));
    }

    #[tokio::test]
    async fn test_pages_carry_csrf_token() {
        let mut config = Config::testing();
        config.csrf_enabled = true;
        let app = TestApp::with_config(config).await;

        let mut res = TestClient::get(app.url("/auth/login")).send(&app.service).await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body = res.take_string().await.unwrap();
        let marker = "name=\"csrf_token\" value=\"";
        let start = body.find(marker).unwrap() + marker.len();
        let token = &body[start..start + body[start..].find('"').unwrap()];
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn test_static_files_served() {
        let app = TestApp::new().await;
        let res = TestClient::get(app.url("/static/css/style.css"))
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
    }
}
