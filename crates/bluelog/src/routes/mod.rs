//! HTTP routes.

use salvo::csrf::{FormFinder, HeaderFinder, hmac_session_csrf};
use salvo::flash::SessionStore as FlashSessionStore;
use salvo::prelude::*;
use salvo::serve_static::StaticDir;
use salvo::session::{MemoryStore, SessionHandler};

use crate::auth::restore_login;
use crate::config::Config;
use crate::{AppError, AppResult};

pub mod admin;
pub mod auth;
pub mod blog;

pub const SESSION_COOKIE: &str = "bluelog_session";
pub const CSRF_FIELD: &str = "csrf_token";
/// Scripted uploads may send the token as a header instead of a form field.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Session, flash and CSRF hoops around every route group.
pub fn router(config: &Config) -> AppResult<Router> {
    let session = SessionHandler::builder(MemoryStore::new(), &config.session_key())
        .cookie_name(SESSION_COOKIE)
        .build()
        .map_err(|e| AppError::Session(e.to_string()))?;

    let mut router = Router::new()
        .hoop(session)
        .hoop(FlashSessionStore::new().into_handler())
        .hoop(restore_login);
    if config.csrf_enabled {
        let csrf = hmac_session_csrf(config.csrf_key(), FormFinder::new(CSRF_FIELD))
            .add_finder(HeaderFinder::new(CSRF_HEADER));
        router = router.hoop(csrf_pending).hoop(csrf).hoop(csrf_passed);
    }

    Ok(router
        .push(Router::with_path("static/{**path}").get(StaticDir::new(config.static_path.clone())))
        .push(auth::router())
        .push(admin::router(config))
        .push(blog::router()))
}

/// How far a request got through the CSRF guard. Absent when the guard is disabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrfCheck {
    Pending,
    Passed,
}

#[handler]
async fn csrf_pending(depot: &mut Depot) {
    depot.inject(CsrfCheck::Pending);
}

#[handler]
async fn csrf_passed(depot: &mut Depot) {
    depot.inject(CsrfCheck::Passed);
}

/// Path id, a malformed one is treated as missing.
pub(crate) fn id_param(req: &Request, name: &str) -> AppResult<i64> {
    req.param::<i64>(name).ok_or(AppError::NotFound)
}

pub(crate) fn page_param(req: &Request) -> u32 {
    req.query::<u32>("page").unwrap_or(1)
}
