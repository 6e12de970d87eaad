//! Sample content for development databases.

use chrono::{Duration, NaiveDateTime, Utc};
use fake::Fake;
use fake::faker::internet::en::{DomainSuffix, SafeEmail};
use fake::faker::lorem::en::{Paragraphs, Sentence, Word};
use fake::faker::name::en::Name;
use rand::Rng;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::models::admin::NewAdmin;
use crate::models::category::is_unique_violation;
use crate::models::{Admin, Category, Comment, CommentAuthor, Link, NewComment, NewPost, Post};
use crate::{AppResult, db};

pub const FAKE_ADMIN_USERNAME: &str = "admin";
pub const FAKE_ADMIN_PASSWORD: &str = "helloflask";
const FAKE_ADMIN_NAME: &str = "Mima Kirigoe";

/// How much content `forge` generates.
#[derive(Clone, Copy, Debug)]
pub struct ForgeCounts {
    pub category: usize,
    pub post: usize,
    pub comment: usize,
}

impl Default for ForgeCounts {
    fn default() -> Self {
        Self {
            category: 10,
            post: 50,
            comment: 500,
        }
    }
}

/// Some moment within the last year.
fn random_timestamp() -> NaiveDateTime {
    let seconds = rand::rng().random_range(0..365 * 24 * 3600);
    Utc::now().naive_utc() - Duration::seconds(seconds)
}

fn pick<T: Copy>(items: &[T]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    Some(items[rand::rng().random_range(0..items.len())])
}

fn truncate(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        text
    } else {
        text.chars().take(max).collect::<String>().trim_end().to_owned()
    }
}

fn fake_visitor() -> CommentAuthor {
    let domain: String = Word().fake();
    let suffix: String = DomainSuffix().fake();
    CommentAuthor::Visitor {
        author: truncate(Name().fake(), 30),
        email: SafeEmail().fake(),
        site: Some(format!("https://{domain}.{suffix}")),
    }
}

fn fake_body() -> String {
    Sentence(4..12).fake()
}

pub async fn fake_admin(pool: &SqlitePool) -> AppResult<i64> {
    Admin::create(
        pool,
        &NewAdmin {
            username: FAKE_ADMIN_USERNAME,
            password: FAKE_ADMIN_PASSWORD,
            blog_title: "Bluelog",
            blog_sub_title: "No, I'm the real thing.",
            name: FAKE_ADMIN_NAME,
            about: "Um, l, Mima Kirigoe, had a fun time as a member of CHAM...",
        },
    )
    .await
}

/// The default category plus up to `count` random ones. Duplicate names are skipped.
pub async fn fake_categories(pool: &SqlitePool, count: usize) -> AppResult<usize> {
    Category::ensure_default(pool).await?;
    let mut created = 0;
    for _ in 0..count {
        let name: String = Word().fake();
        match Category::create(pool, &truncate(name, 30)).await {
            Ok(_) => created += 1,
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

pub async fn fake_posts(pool: &SqlitePool, count: usize) -> AppResult<()> {
    let category_ids: Vec<i64> = Category::all(pool).await?.into_iter().map(|c| c.id).collect();
    for _ in 0..count {
        let title = truncate(Sentence(3..7).fake(), 60);
        let paragraphs: Vec<String> = Paragraphs(3..6).fake();
        let body = paragraphs
            .iter()
            .map(|p| format!("<p>{p}</p>"))
            .collect::<Vec<_>>()
            .join("\n");
        let Some(category_id) = pick(&category_ids) else {
            break;
        };
        let timestamp = random_timestamp();
        Post::create_at(
            pool,
            &NewPost {
                title: &title,
                body: &body,
                category_id,
            },
            timestamp,
        )
        .await?;
    }
    Ok(())
}

/// `count` reviewed visitor comments, then a tenth as many unreviewed ones,
/// admin comments and replies.
pub async fn fake_comments(pool: &SqlitePool, config: &Config, count: usize) -> AppResult<()> {
    let post_ids = Post::ids(pool).await?;
    if post_ids.is_empty() {
        return Ok(());
    }
    let extra = count / 10;

    for reviewed in std::iter::repeat_n(true, count).chain(std::iter::repeat_n(false, extra)) {
        let Some(post_id) = pick(&post_ids) else { break };
        let mut new = NewComment::new(post_id, fake_visitor(), fake_body(), None);
        new.reviewed = reviewed;
        new.timestamp = random_timestamp();
        Comment::submit(pool, &new).await?;
    }

    for _ in 0..extra {
        let Some(post_id) = pick(&post_ids) else { break };
        let author = CommentAuthor::Admin {
            name: FAKE_ADMIN_NAME.to_owned(),
            email: config.admin_email.clone(),
        };
        let mut new = NewComment::new(post_id, author, fake_body(), None);
        new.timestamp = random_timestamp();
        Comment::submit(pool, &new).await?;
    }

    let comment_ids = Comment::ids(pool).await?;
    for _ in 0..extra {
        let Some((replied_id, post_id)) = pick(&comment_ids) else {
            break;
        };
        let mut new = NewComment::new(post_id, fake_visitor(), fake_body(), Some(replied_id));
        new.reviewed = true;
        new.timestamp = random_timestamp();
        Comment::submit(pool, &new).await?;
    }
    Ok(())
}

pub async fn fake_links(pool: &SqlitePool) -> AppResult<()> {
    for (name, url) in [
        ("Twitter", "https://twitter.com"),
        ("Facebook", "https://facebook.com"),
        ("LinkedIn", "https://linkedin.com"),
        ("Google+", "https://google.com"),
    ] {
        Link::create(pool, name, url).await?;
    }
    Ok(())
}

/// Rebuilds the schema and fills it with generated content.
pub async fn forge(pool: &SqlitePool, config: &Config, counts: ForgeCounts) -> AppResult<()> {
    db::drop_all(pool).await?;
    db::migrate(pool).await?;
    tracing::info!("generating the administrator");
    fake_admin(pool).await?;
    tracing::info!(count = counts.category, "generating categories");
    fake_categories(pool, counts.category).await?;
    tracing::info!(count = counts.post, "generating posts");
    fake_posts(pool, counts.post).await?;
    tracing::info!(count = counts.comment, "generating comments");
    fake_comments(pool, config, counts.comment).await?;
    tracing::info!("generating links");
    fake_links(pool).await?;
    Ok(())
}
