//! Back-office: settings, posts, comments, categories, links and image upload.

use salvo::flash::FlashDepotExt;
use salvo::prelude::*;
use salvo::serve_static::StaticDir;
use serde_json::json;
use tera::Context;

use super::{id_param, page_param};
use crate::auth::{self, require_login};
use crate::config::Config;
use crate::forms::{CategoryForm, FieldErrors, LinkForm, PostForm, SettingForm};
use crate::models::admin::Settings;
use crate::models::category::is_unique_violation;
use crate::models::{Admin, Category, Comment, CommentFilter, DEFAULT_CATEGORY_ID, Link, NewPost, Post};
use crate::render::page_context;
use crate::state::{AppState, app_state};
use crate::utils::{redirect, redirect_back, sanitize_filename};
use crate::{AppError, AppResult};

pub fn router(config: &Config) -> Router {
    let guarded = Router::new()
        .hoop(require_login)
        .push(Router::with_path("settings").get(settings_page).post(settings))
        .push(
            Router::with_path("post")
                .push(Router::with_path("manage").get(manage_post))
                .push(Router::with_path("new").get(new_post_page).post(new_post))
                .push(Router::with_path("{id}/edit").get(edit_post_page).post(edit_post))
                .push(Router::with_path("{id}/delete").post(delete_post))
                .push(Router::with_path("{id}/set-comment").post(set_comment)),
        )
        .push(
            Router::with_path("comment")
                .push(Router::with_path("manage").get(manage_comment))
                .push(Router::with_path("{id}/approve").post(approve_comment))
                .push(Router::with_path("{id}/delete").post(delete_comment)),
        )
        .push(
            Router::with_path("category")
                .push(Router::with_path("manage").get(manage_category))
                .push(Router::with_path("new").get(new_category_page).post(new_category))
                .push(Router::with_path("{id}/edit").get(edit_category_page).post(edit_category))
                .push(Router::with_path("{id}/delete").post(delete_category)),
        )
        .push(
            Router::with_path("link")
                .push(Router::with_path("manage").get(manage_link))
                .push(Router::with_path("new").get(new_link_page).post(new_link))
                .push(Router::with_path("{id}/edit").get(edit_link_page).post(edit_link))
                .push(Router::with_path("{id}/delete").post(delete_link)),
        )
        .push(Router::with_path("upload").post(upload_image));

    Router::with_path("admin")
        // Posts embed uploaded images, so serving them needs no login.
        .push(Router::with_path("uploads/{**path}").get(StaticDir::new(config.upload_path.clone())))
        .push(guarded)
}

/// Renders `template` with the shared context plus whatever `fill` adds.
async fn render_page(
    req: &Request,
    depot: &mut Depot,
    res: &mut Response,
    state: &AppState,
    template: &str,
    fill: impl FnOnce(&mut Context),
) -> AppResult<()> {
    let mut ctx = page_context(req, depot, state).await?;
    fill(&mut ctx);
    res.render(state.render(template, &ctx)?);
    Ok(())
}

// ---- settings

#[handler]
async fn settings_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let admin = current_admin(depot, &state).await?;
    let form = SettingForm {
        name: admin.name,
        blog_title: admin.blog_title,
        blog_sub_title: admin.blog_sub_title,
        about: admin.about,
    };
    render_page(req, depot, res, &state, "admin/settings.html", |ctx| {
        ctx.insert("form", &form);
        ctx.insert("errors", &FieldErrors::new());
    })
    .await
}

#[handler]
async fn settings(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let admin = current_admin(depot, &state).await?;
    let form = req.parse_form::<SettingForm>().await?;
    if let Err(errors) = form.validate() {
        return render_page(req, depot, res, &state, "admin/settings.html", |ctx| {
            ctx.insert("form", &form);
            ctx.insert("errors", &errors);
        })
        .await;
    }
    let changes = Settings {
        name: form.name.trim(),
        blog_title: form.blog_title.trim(),
        blog_sub_title: form.blog_sub_title.trim(),
        about: &form.about,
    };
    Admin::update_settings(&state.db, admin.id, &changes).await?;
    depot.outgoing_flash_mut().success("Setting updated.");
    redirect(res, "/");
    Ok(())
}

async fn current_admin(depot: &Depot, state: &AppState) -> AppResult<Admin> {
    let id = auth::current_admin_id(depot).ok_or(AppError::NotFound)?;
    Admin::find(&state.db, id).await?.ok_or(AppError::NotFound)
}

// ---- posts

#[handler]
async fn manage_post(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let pagination = Post::paginate(&state.db, page_param(req), state.config.manage_post_per_page).await?;
    render_page(req, depot, res, &state, "admin/manage_post.html", |ctx| {
        ctx.insert("pagination", &pagination);
    })
    .await
}

async fn render_post_form(
    req: &Request,
    depot: &mut Depot,
    res: &mut Response,
    state: &AppState,
    post_id: Option<i64>,
    form: &PostForm,
    errors: &FieldErrors,
) -> AppResult<()> {
    let choices = Category::all(&state.db).await?;
    render_page(req, depot, res, state, "admin/post_form.html", |ctx| {
        ctx.insert("post_id", &post_id);
        ctx.insert("form", form);
        ctx.insert("errors", errors);
        ctx.insert("choices", &choices);
    })
    .await
}

/// Validates `form` and resolves its category, or collects why it can not be saved.
async fn checked_post_form(state: &AppState, form: &PostForm) -> AppResult<Result<i64, FieldErrors>> {
    let mut errors = form.validate().err().unwrap_or_default();
    if let Some(category_id) = form.category_id() {
        if Category::find(&state.db, category_id).await?.is_none() {
            errors
                .entry("category")
                .or_default()
                .push("Not a valid choice.".to_owned());
        } else if errors.is_empty() {
            return Ok(Ok(category_id));
        }
    }
    Ok(Err(errors))
}

#[handler]
async fn new_post_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let form = PostForm {
        category: DEFAULT_CATEGORY_ID.to_string(),
        ..Default::default()
    };
    render_post_form(req, depot, res, &state, None, &form, &FieldErrors::new()).await
}

#[handler]
async fn new_post(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let form = req.parse_form::<PostForm>().await?;
    let category_id = match checked_post_form(&state, &form).await? {
        Ok(category_id) => category_id,
        Err(errors) => return render_post_form(req, depot, res, &state, None, &form, &errors).await,
    };
    let id = Post::create(
        &state.db,
        &NewPost {
            title: form.title.trim(),
            body: &form.body,
            category_id,
        },
    )
    .await?;
    tracing::info!(post = id, "post created");
    depot.outgoing_flash_mut().success("Post created.");
    redirect(res, format!("/post/{id}"));
    Ok(())
}

#[handler]
async fn edit_post_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let post = Post::get(&state.db, id_param(req, "id")?).await?;
    let form = PostForm {
        title: post.title,
        body: post.body,
        category: post.category_id.to_string(),
    };
    render_post_form(req, depot, res, &state, Some(post.id), &form, &FieldErrors::new()).await
}

#[handler]
async fn edit_post(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let post = Post::get(&state.db, id_param(req, "id")?).await?;
    let form = req.parse_form::<PostForm>().await?;
    let category_id = match checked_post_form(&state, &form).await? {
        Ok(category_id) => category_id,
        Err(errors) => return render_post_form(req, depot, res, &state, Some(post.id), &form, &errors).await,
    };
    Post::update(
        &state.db,
        post.id,
        &NewPost {
            title: form.title.trim(),
            body: &form.body,
            category_id,
        },
    )
    .await?;
    depot.outgoing_flash_mut().success("Post updated.");
    redirect(res, format!("/post/{}", post.id));
    Ok(())
}

#[handler]
async fn delete_post(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let id = id_param(req, "id")?;
    Post::delete(&state.db, id).await?;
    tracing::info!(post = id, "post deleted");
    depot.outgoing_flash_mut().success("Post deleted.");
    redirect_back(req, res);
    Ok(())
}

#[handler]
async fn set_comment(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let can_comment = Post::toggle_comment(&state.db, id_param(req, "id")?).await?;
    let message = if can_comment { "Comment enabled." } else { "Comment disabled." };
    depot.outgoing_flash_mut().success(message);
    redirect_back(req, res);
    Ok(())
}

// ---- comments

#[handler]
async fn manage_comment(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let filter = req
        .query::<String>("filter")
        .map_or(CommentFilter::All, |raw| CommentFilter::from_query(&raw));
    let pagination =
        Comment::filtered(&state.db, filter, page_param(req), state.config.comment_per_page).await?;
    render_page(req, depot, res, &state, "admin/manage_comment.html", |ctx| {
        ctx.insert("filter", &filter);
        ctx.insert("pagination", &pagination);
    })
    .await
}

#[handler]
async fn approve_comment(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    Comment::approve(&state.db, id_param(req, "id")?).await?;
    depot.outgoing_flash_mut().success("Comment published.");
    redirect_back(req, res);
    Ok(())
}

#[handler]
async fn delete_comment(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    Comment::delete(&state.db, id_param(req, "id")?).await?;
    depot.outgoing_flash_mut().success("Comment deleted.");
    redirect_back(req, res);
    Ok(())
}

// ---- categories

#[handler]
async fn manage_category(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    render_page(req, depot, res, &state, "admin/manage_category.html", |_| {}).await
}

async fn render_category_form(
    req: &Request,
    depot: &mut Depot,
    res: &mut Response,
    state: &AppState,
    category_id: Option<i64>,
    form: &CategoryForm,
    errors: &FieldErrors,
) -> AppResult<()> {
    render_page(req, depot, res, state, "admin/category_form.html", |ctx| {
        ctx.insert("category_id", &category_id);
        ctx.insert("form", form);
        ctx.insert("errors", errors);
    })
    .await
}

/// Validates `form`, including the uniqueness of the name among other categories.
async fn checked_category_form(
    state: &AppState,
    form: &CategoryForm,
    editing: Option<i64>,
) -> AppResult<Result<(), FieldErrors>> {
    let mut errors = form.validate().err().unwrap_or_default();
    if errors.is_empty() {
        let taken = Category::find_by_name(&state.db, form.name.trim()).await?;
        if taken.is_some_and(|c| Some(c.id) != editing) {
            errors.entry("name").or_default().push("Name already in use.".to_owned());
        }
    }
    Ok(if errors.is_empty() { Ok(()) } else { Err(errors) })
}

fn name_taken() -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert("name", vec!["Name already in use.".to_owned()]);
    errors
}

#[handler]
async fn new_category_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    render_category_form(req, depot, res, &state, None, &CategoryForm::default(), &FieldErrors::new()).await
}

#[handler]
async fn new_category(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let form = req.parse_form::<CategoryForm>().await?;
    if let Err(errors) = checked_category_form(&state, &form, None).await? {
        return render_category_form(req, depot, res, &state, None, &form, &errors).await;
    }
    match Category::create(&state.db, form.name.trim()).await {
        Ok(_) => {}
        // Lost a race with another insert of the same name.
        Err(e) if is_unique_violation(&e) => {
            return render_category_form(req, depot, res, &state, None, &form, &name_taken()).await;
        }
        Err(e) => return Err(e),
    }
    depot.outgoing_flash_mut().success("Category created.");
    redirect(res, "/admin/category/manage");
    Ok(())
}

#[handler]
async fn edit_category_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let id = id_param(req, "id")?;
    if id == DEFAULT_CATEGORY_ID {
        depot.outgoing_flash_mut().warning("You can not edit the default category.");
        redirect(res, "/");
        return Ok(());
    }
    let category = Category::find(&state.db, id).await?.ok_or(AppError::NotFound)?;
    let form = CategoryForm { name: category.name };
    render_category_form(req, depot, res, &state, Some(id), &form, &FieldErrors::new()).await
}

#[handler]
async fn edit_category(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let id = id_param(req, "id")?;
    if id == DEFAULT_CATEGORY_ID {
        depot.outgoing_flash_mut().warning("You can not edit the default category.");
        redirect(res, "/");
        return Ok(());
    }
    Category::find(&state.db, id).await?.ok_or(AppError::NotFound)?;
    let form = req.parse_form::<CategoryForm>().await?;
    if let Err(errors) = checked_category_form(&state, &form, Some(id)).await? {
        return render_category_form(req, depot, res, &state, Some(id), &form, &errors).await;
    }
    match Category::rename(&state.db, id, form.name.trim()).await {
        Ok(()) => {}
        Err(e) if is_unique_violation(&e) => {
            return render_category_form(req, depot, res, &state, Some(id), &form, &name_taken()).await;
        }
        Err(e) => return Err(e),
    }
    depot.outgoing_flash_mut().success("Category updated.");
    redirect(res, "/admin/category/manage");
    Ok(())
}

#[handler]
async fn delete_category(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let id = id_param(req, "id")?;
    if id == DEFAULT_CATEGORY_ID {
        depot.outgoing_flash_mut().warning("You can not delete the default category.");
        redirect(res, "/");
        return Ok(());
    }
    Category::delete(&state.db, id).await?;
    depot.outgoing_flash_mut().success("Category deleted.");
    redirect(res, "/admin/category/manage");
    Ok(())
}

// ---- links

#[handler]
async fn manage_link(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    render_page(req, depot, res, &state, "admin/manage_link.html", |_| {}).await
}

async fn render_link_form(
    req: &Request,
    depot: &mut Depot,
    res: &mut Response,
    state: &AppState,
    link_id: Option<i64>,
    form: &LinkForm,
    errors: &FieldErrors,
) -> AppResult<()> {
    render_page(req, depot, res, state, "admin/link_form.html", |ctx| {
        ctx.insert("link_id", &link_id);
        ctx.insert("form", form);
        ctx.insert("errors", errors);
    })
    .await
}

#[handler]
async fn new_link_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    render_link_form(req, depot, res, &state, None, &LinkForm::default(), &FieldErrors::new()).await
}

#[handler]
async fn new_link(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let form = req.parse_form::<LinkForm>().await?;
    if let Err(errors) = form.validate() {
        return render_link_form(req, depot, res, &state, None, &form, &errors).await;
    }
    Link::create(&state.db, form.name.trim(), form.url.trim()).await?;
    depot.outgoing_flash_mut().success("New link created.");
    redirect(res, "/admin/link/manage");
    Ok(())
}

#[handler]
async fn edit_link_page(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let link = Link::get(&state.db, id_param(req, "id")?).await?;
    let form = LinkForm {
        name: link.name,
        url: link.url,
    };
    render_link_form(req, depot, res, &state, Some(link.id), &form, &FieldErrors::new()).await
}

#[handler]
async fn edit_link(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let link = Link::get(&state.db, id_param(req, "id")?).await?;
    let form = req.parse_form::<LinkForm>().await?;
    if let Err(errors) = form.validate() {
        return render_link_form(req, depot, res, &state, Some(link.id), &form, &errors).await;
    }
    Link::update(&state.db, link.id, form.name.trim(), form.url.trim()).await?;
    depot.outgoing_flash_mut().success("Link updated.");
    redirect(res, "/admin/link/manage");
    Ok(())
}

#[handler]
async fn delete_link(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    Link::delete(&state.db, id_param(req, "id")?).await?;
    depot.outgoing_flash_mut().success("Link deleted.");
    redirect(res, "/admin/link/manage");
    Ok(())
}

// ---- upload

/// Image upload endpoint of the post editor. Replies in the CKEditor JSON format.
#[handler]
async fn upload_image(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let Some(file) = req.file("upload").await else {
        res.render(Json(json!({"uploaded": 0, "error": {"message": "Image only!"}})));
        return Ok(());
    };
    let filename = sanitize_filename(file.name().unwrap_or_default());
    if filename.is_empty() || !state.config.is_allowed_image(&filename) {
        res.render(Json(json!({"uploaded": 0, "error": {"message": "Image only!"}})));
        return Ok(());
    }
    tokio::fs::create_dir_all(&state.config.upload_path).await?;
    tokio::fs::copy(file.path(), state.config.upload_path.join(&filename)).await?;
    tracing::info!(file = %filename, "image uploaded");
    res.render(Json(json!({
        "uploaded": 1,
        "fileName": filename,
        "url": format!("/admin/uploads/{filename}"),
    })));
    Ok(())
}

#[cfg(test)]
mod tests {
    use salvo::http::header::REFERER;
    use salvo::test::{ResponseExt, TestClient};

    use super::*;
    use crate::models::{CommentAuthor, NewComment};
    use crate::testing::{TestApp, cookie_header, location};

    fn multipart(filename: &str, data: &str) -> Vec<u8> {
        format!(
            "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{data}\r\n--XBOUNDARY--\r\n"
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn test_upload_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::testing();
        config.upload_path = dir.path().to_path_buf();
        let app = TestApp::with_config(config).await;
        let cookie = app.login().await;

        let mut res = TestClient::post(app.url("/admin/upload"))
            .add_header("cookie", &cookie, true)
            .add_header("content-type", "multipart/form-data; boundary=XBOUNDARY", true)
            .bytes(multipart("../cat.PNG", "fake png"))
            .send(&app.service)
            .await;
        let reply: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(reply["uploaded"], 1);
        assert_eq!(reply["fileName"], "cat.PNG");
        assert_eq!(reply["url"], "/admin/uploads/cat.PNG");
        assert!(dir.path().join("cat.PNG").exists());

        // Served without a session.
        let mut res = TestClient::get(app.url("/admin/uploads/cat.PNG"))
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(res.take_string().await.unwrap(), "fake png");

        let mut res = TestClient::post(app.url("/admin/upload"))
            .add_header("cookie", &cookie, true)
            .add_header("content-type", "multipart/form-data; boundary=XBOUNDARY", true)
            .bytes(multipart("script.svg", "<svg/>"))
            .send(&app.service)
            .await;
        let reply: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(reply["uploaded"], 0);
        assert_eq!(reply["error"]["message"], "Image only!");
        assert!(!dir.path().join("script.svg").exists());
    }

    #[tokio::test]
    async fn test_admin_pages_require_login() {
        let app = TestApp::new().await;
        for path in [
            "/admin/settings",
            "/admin/post/manage",
            "/admin/comment/manage",
            "/admin/category/manage",
            "/admin/link/manage",
        ] {
            let res = TestClient::get(app.url(path)).send(&app.service).await;
            assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER), "{path}");
            assert!(location(&res).starts_with("/auth/login?next="), "{path}");
        }
        let res = TestClient::post(app.url("/admin/category/1/delete"))
            .send(&app.service)
            .await;
        assert!(location(&res).starts_with("/auth/login"));
    }

    #[tokio::test]
    async fn test_comment_scenario() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let db = &app.state.db;

        // Post P in the default category.
        let res = TestClient::post(app.url("/admin/post/new"))
            .add_header("cookie", &cookie, true)
            .raw_form("title=Post+P&body=%3Cp%3EHello%3C%2Fp%3E&category=1")
            .send(&app.service)
            .await;
        let post_url = location(&res);
        let post_id: i64 = post_url.trim_start_matches("/post/").parse().unwrap();
        assert_eq!(Post::get(db, post_id).await.unwrap().category_id, DEFAULT_CATEGORY_ID);

        // Anonymous C1.
        let res = TestClient::post(app.url(&post_url))
            .raw_form("author=Visitor&email=visitor%40example.com&body=First+C1")
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER));
        let c1 = Comment::filtered(db, CommentFilter::All, 1, 15).await.unwrap().items[0].clone();
        assert!(!c1.reviewed);
        assert!(!c1.from_admin);

        // The admin replies with C2, whatever the form claims.
        let res = TestClient::post(app.url(&format!("{post_url}?reply={}", c1.id)))
            .add_header("cookie", &cookie, true)
            .raw_form("author=Impostor&email=x%40example.com&body=Reply+C2")
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER));
        let c2 = Comment::filtered(db, CommentFilter::Admin, 1, 15).await.unwrap().items[0].clone();
        assert!(c2.reviewed);
        assert!(c2.from_admin);
        assert_eq!(c2.replied_id, Some(c1.id));
        assert_eq!(c2.author, "Mima Kirigoe");

        let sent = app.mailer.wait_for(2).await;
        assert!(sent.iter().any(|m| m.subject == "New comment" && m.to == "admin@example.com"));
        assert!(sent.iter().any(|m| m.subject == "New reply" && m.to == "visitor@example.com"));

        // Approve C1 twice.
        for _ in 0..2 {
            let res = TestClient::post(app.url(&format!("/admin/comment/{}/approve", c1.id)))
                .add_header("cookie", &cookie, true)
                .send(&app.service)
                .await;
            assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER));
        }

        let mut res = TestClient::get(app.url(&post_url)).send(&app.service).await;
        let body = res.take_string().await.unwrap();
        let first = body.find("First C1").unwrap();
        let second = body.find("Reply C2").unwrap();
        assert!(first < second);

        let res = TestClient::post(app.url(&format!("/admin/comment/{}/delete", c1.id)))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER));
        assert!(Comment::find(db, c1.id).await.unwrap().is_none());
        assert!(Comment::find(db, c2.id).await.unwrap().is_none());
        assert!(Post::find(db, post_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_default_category_protected() {
        let app = TestApp::new().await;
        let cookie = app.login().await;

        let res = TestClient::post(app.url("/admin/category/1/delete"))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        assert_eq!(location(&res), "/");
        let cookie_after = cookie_header(&res);

        let res = TestClient::post(app.url("/admin/category/1/edit"))
            .add_header("cookie", &cookie, true)
            .raw_form("name=Renamed")
            .send(&app.service)
            .await;
        assert_eq!(location(&res), "/");

        let default = Category::find(&app.state.db, DEFAULT_CATEGORY_ID).await.unwrap().unwrap();
        assert_eq!(default.name, "Default");

        let mut res = TestClient::get(app.url("/"))
            .add_header("cookie", &cookie_after, true)
            .send(&app.service)
            .await;
        let body = res.take_string().await.unwrap();
        assert!(body.contains("You can not delete the default category."));
    }

    #[tokio::test]
    async fn test_category_lifecycle() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let db = &app.state.db;

        let res = TestClient::post(app.url("/admin/category/new"))
            .add_header("cookie", &cookie, true)
            .raw_form("name=Travel")
            .send(&app.service)
            .await;
        assert_eq!(location(&res), "/admin/category/manage");
        let travel = Category::find_by_name(db, "Travel").await.unwrap().unwrap();

        let mut res = TestClient::post(app.url("/admin/category/new"))
            .add_header("cookie", &cookie, true)
            .raw_form("name=Travel")
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert!(res.take_string().await.unwrap().contains("Name already in use."));

        let post = Post::create(
            db,
            &NewPost {
                title: "Trip",
                body: "body",
                category_id: travel.id,
            },
        )
        .await
        .unwrap();

        let res = TestClient::post(app.url(&format!("/admin/category/{}/delete", travel.id)))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER));
        assert_eq!(Post::get(db, post).await.unwrap().category_id, DEFAULT_CATEGORY_ID);

        let res = TestClient::post(app.url(&format!("/admin/category/{}/delete", travel.id)))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_post_management() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let db = &app.state.db;

        let mut res = TestClient::post(app.url("/admin/post/new"))
            .add_header("cookie", &cookie, true)
            .raw_form("title=&body=text&category=77")
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body = res.take_string().await.unwrap();
        assert!(body.contains("This field is required."));
        assert!(body.contains("Not a valid choice."));

        let id = Post::create(
            db,
            &NewPost {
                title: "Draft",
                body: "body",
                category_id: DEFAULT_CATEGORY_ID,
            },
        )
        .await
        .unwrap();
        Comment::submit(
            db,
            &NewComment::new(
                id,
                CommentAuthor::Visitor {
                    author: "Grey".to_owned(),
                    email: "grey@example.com".to_owned(),
                    site: None,
                },
                "hi",
                None,
            ),
        )
        .await
        .unwrap();

        let res = TestClient::post(app.url(&format!("/admin/post/{id}/edit")))
            .add_header("cookie", &cookie, true)
            .raw_form("title=Final&body=done&category=1")
            .send(&app.service)
            .await;
        assert_eq!(location(&res), format!("/post/{id}"));
        assert_eq!(Post::get(db, id).await.unwrap().title, "Final");

        let res = TestClient::post(app.url(&format!("/admin/post/{id}/set-comment")))
            .add_header("cookie", &cookie, true)
            .add_header(REFERER, app.url("/admin/post/manage"), true)
            .send(&app.service)
            .await;
        assert_eq!(location(&res), app.url("/admin/post/manage"));
        assert!(!Post::get(db, id).await.unwrap().can_comment);

        let res = TestClient::post(app.url(&format!("/admin/post/{id}/delete")))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SEE_OTHER));
        assert!(Post::find(db, id).await.unwrap().is_none());
        assert_eq!(Comment::count_unreviewed(db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_manage_comment_filters() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        for filter in ["all", "unread", "admin"] {
            let res = TestClient::get(app.url(&format!("/admin/comment/manage?filter={filter}")))
                .add_header("cookie", &cookie, true)
                .send(&app.service)
                .await;
            assert_eq!(res.status_code, Some(StatusCode::OK), "{filter}");
        }

        let post_id = Post::create(
            &app.state.db,
            &NewPost {
                title: "Filtered",
                body: "body",
                category_id: DEFAULT_CATEGORY_ID,
            },
        )
        .await
        .unwrap();
        let visitor = CommentAuthor::Visitor {
            author: "Grey".to_owned(),
            email: "grey@example.com".to_owned(),
            site: None,
        };
        Comment::submit(&app.state.db, &NewComment::new(post_id, visitor, "Pending words", None))
            .await
            .unwrap();
        let admin = CommentAuthor::Admin {
            name: "Admin".to_owned(),
            email: "admin@example.com".to_owned(),
        };
        Comment::submit(&app.state.db, &NewComment::new(post_id, admin, "Owner words", None))
            .await
            .unwrap();

        let mut res = TestClient::get(app.url("/admin/comment/manage?filter=spam"))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body = res.take_string().await.unwrap();
        assert!(body.contains("Pending words"));
        assert!(body.contains("Owner words"));

        let mut res = TestClient::get(app.url("/admin/comment/manage?filter=admin"))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        let body = res.take_string().await.unwrap();
        assert!(!body.contains("Pending words"));
        assert!(body.contains("Owner words"));
    }

    #[tokio::test]
    async fn test_settings_and_links() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let db = &app.state.db;

        let res = TestClient::post(app.url("/admin/settings"))
            .add_header("cookie", &cookie, true)
            .raw_form("name=Grey&blog_title=New+Title&blog_sub_title=Sub&about=Hi")
            .send(&app.service)
            .await;
        assert_eq!(location(&res), "/");
        assert_eq!(Admin::first(db).await.unwrap().unwrap().blog_title, "New Title");

        let mut res = TestClient::get(app.url("/"))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        let body = res.take_string().await.unwrap();
        assert!(body.contains("Setting updated."));
        assert!(body.contains("New Title"));

        let mut res = TestClient::post(app.url("/admin/link/new"))
            .add_header("cookie", &cookie, true)
            .raw_form("name=GitHub&url=not+a+url")
            .send(&app.service)
            .await;
        assert!(res.take_string().await.unwrap().contains("Invalid URL."));

        let res = TestClient::post(app.url("/admin/link/new"))
            .add_header("cookie", &cookie, true)
            .raw_form("name=GitHub&url=https%3A%2F%2Fgithub.com")
            .send(&app.service)
            .await;
        assert_eq!(location(&res), "/admin/link/manage");
        let links = Link::all(db).await.unwrap();
        assert_eq!(links.len(), 1);

        let res = TestClient::post(app.url(&format!("/admin/link/{}/delete", links[0].id)))
            .add_header("cookie", &cookie, true)
            .send(&app.service)
            .await;
        assert_eq!(location(&res), "/admin/link/manage");
        assert!(Link::all(db).await.unwrap().is_empty());
    }
}
