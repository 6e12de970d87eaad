use salvo::flash::FlashDepotExt;
use salvo::prelude::*;

use crate::auth::{self, require_login};
use crate::forms::{FieldErrors, LoginForm};
use crate::models::Admin;
use crate::render::page_context;
use crate::state::{AppState, app_state};
use crate::utils::{redirect, redirect_back};
use crate::AppResult;

pub fn router() -> Router {
    Router::with_path("auth")
        .push(Router::with_path("login").get(login_page).post(login))
        .push(Router::with_path("logout").hoop(require_login).get(logout))
}

async fn render_login(
    req: &Request,
    depot: &mut Depot,
    res: &mut Response,
    state: &AppState,
    form: &LoginForm,
    errors: &FieldErrors,
) -> AppResult<()> {
    let mut ctx = page_context(req, depot, state).await?;
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    res.render(state.render("auth/login.html", &ctx)?);
    Ok(())
}

/// The login page again, keeping `?next=`.
fn retry_url(req: &Request) -> String {
    req.uri()
        .path_and_query()
        .map_or_else(|| "/auth/login".to_owned(), |pq| pq.as_str().to_owned())
}

#[handler]
async fn login_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    if auth::is_authenticated(depot) {
        redirect(res, "/");
        return Ok(());
    }
    let state = app_state(depot)?;
    render_login(req, depot, res, &state, &LoginForm::default(), &FieldErrors::new()).await
}

#[handler]
async fn login(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    if auth::is_authenticated(depot) {
        redirect(res, "/");
        return Ok(());
    }
    let state = app_state(depot)?;
    let form = req.parse_form::<LoginForm>().await?;
    if let Err(errors) = form.validate() {
        return render_login(req, depot, res, &state, &form, &errors).await;
    }

    let Some(admin) = Admin::first(&state.db).await? else {
        depot.outgoing_flash_mut().warning("No account yet.");
        redirect(res, retry_url(req));
        return Ok(());
    };
    if admin.username != form.username.trim() || !admin.validate_password(&form.password) {
        tracing::info!(username = %form.username, "failed login attempt");
        depot.outgoing_flash_mut().warning("Invalid username or password.");
        redirect(res, retry_url(req));
        return Ok(());
    }

    auth::login(depot, admin.id)?;
    if form.remember() {
        auth::remember(res, &state.config, &admin);
    }
    depot.outgoing_flash_mut().info("Welcome back.");
    redirect_back(req, res);
    Ok(())
}

#[handler]
async fn logout(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    auth::logout(depot);
    auth::forget(res);
    depot.outgoing_flash_mut().info("Logout success.");
    redirect_back(req, res);
}
