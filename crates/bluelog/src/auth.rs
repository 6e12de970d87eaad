//! Session based login for the single admin account.

use salvo::flash::FlashDepotExt;
use salvo::http::cookie::Cookie;
use salvo::prelude::*;
use salvo::session::SessionDepotExt;
use sha2::{Digest, Sha256};
use url::form_urlencoded;

use crate::config::Config;
use crate::models::Admin;
use crate::state::{AppState, app_state};
use crate::utils::redirect;
use crate::{AppError, AppResult};

const SESSION_ADMIN_ID: &str = "admin_id";
pub const REMEMBER_COOKIE: &str = "remember_token";
const REMEMBER_DAYS: i64 = 365;

pub fn current_admin_id(depot: &Depot) -> Option<i64> {
    depot.session()?.get::<i64>(SESSION_ADMIN_ID)
}

pub fn is_authenticated(depot: &Depot) -> bool {
    current_admin_id(depot).is_some()
}

pub fn login(depot: &mut Depot, admin_id: i64) -> AppResult<()> {
    let session = depot
        .session_mut()
        .ok_or_else(|| AppError::Session("session handler is not installed".to_owned()))?;
    session
        .insert(SESSION_ADMIN_ID, admin_id)
        .map_err(|e| AppError::Session(e.to_string()))?;
    Ok(())
}

pub fn logout(depot: &mut Depot) {
    if let Some(session) = depot.session_mut() {
        session.remove(SESSION_ADMIN_ID);
    }
}

/// `<id>:<digest>`, bound to the secret key and the current password hash so a
/// credential change invalidates every remembered browser.
#[must_use]
pub fn remember_token(config: &Config, admin: &Admin) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"bluelog.remember.");
    hasher.update(config.secret_key.as_bytes());
    hasher.update(admin.id.to_be_bytes());
    hasher.update(admin.password_hash.as_bytes());
    format!("{}:{:x}", admin.id, hasher.finalize())
}

/// Keeps the admin logged in past the end of the browser session.
pub fn remember(res: &mut Response, config: &Config, admin: &Admin) {
    let cookie = Cookie::build((REMEMBER_COOKIE, remember_token(config, admin)))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::days(REMEMBER_DAYS))
        .build();
    res.add_cookie(cookie);
}

/// Expires the remember cookie in the browser.
pub fn forget(res: &mut Response) {
    let cookie = Cookie::build((REMEMBER_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build();
    res.add_cookie(cookie);
}

async fn remembered_admin(state: &AppState, token: &str) -> AppResult<Option<Admin>> {
    let Some(id) = token.split_once(':').and_then(|(id, _)| id.parse::<i64>().ok()) else {
        return Ok(None);
    };
    let Some(admin) = Admin::find(&state.db, id).await? else {
        return Ok(None);
    };
    Ok((remember_token(&state.config, &admin) == token).then_some(admin))
}

/// Restores the login from the remember cookie once the session is gone. A stale
/// cookie is expired.
#[handler]
pub async fn restore_login(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    if is_authenticated(depot) {
        return;
    }
    let Some(token) = req.cookie(REMEMBER_COOKIE).map(|c| c.value().to_owned()) else {
        return;
    };
    let restored = match app_state(depot) {
        Ok(state) => remembered_admin(&state, &token).await,
        Err(e) => Err(e),
    };
    match restored {
        Ok(Some(admin)) => {
            if let Err(e) = login(depot, admin.id) {
                tracing::error!(error = %e, "failed to restore remembered login");
                return;
            }
            tracing::debug!(admin = admin.id, "login restored from remember cookie");
        }
        Ok(None) => forget(res),
        Err(e) => tracing::error!(error = %e, "failed to check remember cookie"),
    }
}

/// Login page URL that comes back to `target` afterwards.
#[must_use]
pub fn login_url(target: &str) -> String {
    let next: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/auth/login?next={next}")
}

/// Sends anonymous visitors to the login page.
#[handler]
pub async fn require_login(req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
    if is_authenticated(depot) {
        return;
    }
    let target = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_owned(), |pq| pq.as_str().to_owned());
    depot
        .outgoing_flash_mut()
        .warning("Please log in to access this page.");
    redirect(res, login_url(&target));
    ctrl.skip_rest();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_target() {
        assert_eq!(login_url("/admin/post/manage"), "/auth/login?next=%2Fadmin%2Fpost%2Fmanage");
        assert_eq!(
            login_url("/admin/comment/manage?filter=unread"),
            "/auth/login?next=%2Fadmin%2Fcomment%2Fmanage%3Ffilter%3Dunread"
        );
    }
}
