//! Template loading and the context shared by every page.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;
use salvo::csrf::CsrfDepotExt;
use salvo::flash::FlashDepotExt;
use salvo::prelude::*;
use serde::Serialize;
use tera::{Context, Tera, Value};

use crate::config::DEFAULT_THEME;
use crate::models::{Admin, Category, Comment, Link};
use crate::state::AppState;
use crate::{AppError, AppResult, auth};

pub const THEME_COOKIE: &str = "theme";

/// Loads every template below `dir`.
pub fn load_templates(dir: &Path) -> AppResult<Tera> {
    if !dir.is_dir() {
        return Err(AppError::Config(format!("template directory `{}` not found", dir.display())));
    }
    let mut tera = Tera::new(&format!("{}/**/*", dir.display()))?;
    tera.register_filter("datetime", datetime_filter);
    Ok(tera)
}

/// Formats a serialized `NaiveDateTime`, `%Y-%m-%d %H:%M` unless a `format` is given.
fn datetime_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("`datetime` expects a timestamp string"))?;
    let parsed = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| tera::Error::msg(format!("invalid timestamp `{raw}`: {e}")))?;
    let format = args
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("%Y-%m-%d %H:%M");
    Ok(Value::String(parsed.format(format).to_string()))
}

#[derive(Serialize, Debug)]
struct FlashView {
    category: String,
    message: String,
}

/// Context every page template expects: sidebar data, theme, login state,
/// CSRF token and the flashed messages of the previous request.
pub async fn page_context(req: &Request, depot: &mut Depot, state: &AppState) -> AppResult<Context> {
    let mut ctx = Context::new();
    let logged_in = auth::is_authenticated(depot);

    ctx.insert("admin", &Admin::first(&state.db).await?);
    ctx.insert("categories", &Category::all_with_counts(&state.db).await?);
    ctx.insert("links", &Link::all(&state.db).await?);
    ctx.insert("current_user", &logged_in);
    if logged_in {
        ctx.insert("unread_comments", &Comment::count_unreviewed(&state.db).await?);
    }

    let theme = req
        .cookie(THEME_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|name| state.config.theme(name).is_some())
        .unwrap_or(DEFAULT_THEME);
    ctx.insert("theme", theme);
    ctx.insert("themes", &state.config.themes);

    let token = depot.csrf_token().map(|t| t.to_string()).unwrap_or_default();
    ctx.insert("csrf_token", &token);

    let flashes: Vec<FlashView> = depot
        .incoming_flash()
        .map(|flash| {
            flash
                .iter()
                .map(|message| FlashView {
                    category: message.level.to_string(),
                    message: message.value.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    ctx.insert("flashes", &flashes);

    ctx.insert("request_path", req.uri().path());
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_datetime_filter() {
        let value = Value::String("2024-03-09T08:05:00.123456".to_owned());
        let out = datetime_filter(&value, &HashMap::new()).unwrap();
        assert_eq!(out, Value::String("2024-03-09 08:05".to_owned()));

        let mut args = HashMap::new();
        args.insert("format".to_owned(), Value::String("%B %d, %Y".to_owned()));
        let out = datetime_filter(&value, &args).unwrap();
        assert_eq!(out, Value::String("March 09, 2024".to_owned()));

        assert!(datetime_filter(&Value::Bool(true), &HashMap::new()).is_err());
    }

    #[test]
    fn test_templates_load() {
        let tera = load_templates(&Config::testing().template_path).unwrap();
        for name in ["base.html", "blog/index.html", "admin/manage_comment.html", "errors/404.html"] {
            assert!(tera.get_template_names().any(|n| n == name), "missing {name}");
        }
    }

    #[test]
    fn test_missing_template_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_templates(&dir.path().join("nowhere")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
