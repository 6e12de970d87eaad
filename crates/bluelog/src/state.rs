use std::sync::Arc;

use salvo::prelude::*;
use salvo::writing::Text;
use sqlx::SqlitePool;
use tera::{Context, Tera};

use crate::config::Config;
use crate::mail::{Mailer, Notifier};
use crate::{AppError, AppResult, db, render};

/// Everything a handler needs, injected into the depot by `affix_state`.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: SqlitePool,
    pub templates: Arc<Tera>,
    pub notifier: Notifier,
}

impl AppState {
    /// Connects the database and loads the templates. Migrations are not run.
    pub async fn new(config: Config, mailer: Arc<dyn Mailer>) -> AppResult<Self> {
        let db = db::connect(&config).await?;
        let templates = render::load_templates(&config.template_path)?;
        let notifier = Notifier::new(mailer, &config);
        Ok(Self {
            config: Arc::new(config),
            db,
            templates: Arc::new(templates),
            notifier,
        })
    }

    pub fn render(&self, name: &str, ctx: &Context) -> AppResult<Text<String>> {
        Ok(Text::Html(self.templates.render(name, ctx)?))
    }
}

/// The injected state, cloned out of the depot.
pub fn app_state(depot: &Depot) -> AppResult<AppState> {
    depot
        .obtain::<AppState>()
        .cloned()
        .map_err(|_| AppError::Config("application state is not injected".to_owned()))
}
