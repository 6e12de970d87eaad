use salvo::flash::FlashDepotExt;
use salvo::http::cookie::Cookie;
use salvo::prelude::*;
use url::form_urlencoded;

use super::{id_param, page_param};
use crate::forms::{CommentForm, FieldErrors};
use crate::models::{Admin, Category, Comment, CommentAuthor, NewComment, Post};
use crate::render::{THEME_COOKIE, page_context};
use crate::state::{AppState, app_state};
use crate::utils::{redirect, redirect_back};
use crate::{AppError, AppResult, auth};

pub fn router() -> Router {
    Router::new()
        .get(index)
        .push(Router::with_path("about").get(about))
        .push(Router::with_path("category/{id}").get(show_category))
        .push(Router::with_path("post/{id}").get(show_post).post(post_comment))
        .push(Router::with_path("reply/comment/{id}").get(reply_comment))
        .push(Router::with_path("change-theme/{name}").get(change_theme))
}

#[handler]
async fn index(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let pagination = Post::paginate(&state.db, page_param(req), state.config.post_per_page).await?;
    let mut ctx = page_context(req, depot, &state).await?;
    ctx.insert("pagination", &pagination);
    res.render(state.render("blog/index.html", &ctx)?);
    Ok(())
}

#[handler]
async fn about(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let ctx = page_context(req, depot, &state).await?;
    res.render(state.render("blog/about.html", &ctx)?);
    Ok(())
}

#[handler]
async fn show_category(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let category = Category::find(&state.db, id_param(req, "id")?)
        .await?
        .ok_or(AppError::NotFound)?;
    let pagination =
        Post::paginate_in_category(&state.db, category.id, page_param(req), state.config.post_per_page).await?;
    let mut ctx = page_context(req, depot, &state).await?;
    ctx.insert("category", &category);
    ctx.insert("pagination", &pagination);
    res.render(state.render("blog/category.html", &ctx)?);
    Ok(())
}

/// Renders a post with its reviewed comments and the comment form.
async fn render_post(
    req: &Request,
    depot: &mut Depot,
    res: &mut Response,
    state: &AppState,
    post: &Post,
    form: &CommentForm,
    errors: &FieldErrors,
) -> AppResult<()> {
    let comments =
        Comment::approved_for_post(&state.db, post.id, page_param(req), state.config.comment_per_page).await?;
    let mut ctx = page_context(req, depot, state).await?;
    ctx.insert("post", post);
    ctx.insert("comments", &comments);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("reply", &req.query::<i64>("reply"));
    ctx.insert("reply_author", &req.query::<String>("author"));
    res.render(state.render("blog/post.html", &ctx)?);
    Ok(())
}

#[handler]
async fn show_post(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let post = Post::get(&state.db, id_param(req, "id")?).await?;
    render_post(req, depot, res, &state, &post, &CommentForm::default(), &FieldErrors::new()).await
}

#[handler]
async fn post_comment(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let post = Post::get(&state.db, id_param(req, "id")?).await?;
    let post_url = format!("/post/{}", post.id);
    if !post.can_comment {
        depot.outgoing_flash_mut().warning("Comment disabled.");
        redirect(res, post_url);
        return Ok(());
    }

    let form = req.parse_form::<CommentForm>().await?;
    let from_admin = auth::is_authenticated(depot);
    if let Err(errors) = form.validate(from_admin) {
        return render_post(req, depot, res, &state, &post, &form, &errors).await;
    }

    let author = if from_admin {
        let admin = Admin::first(&state.db).await?.ok_or(AppError::NotFound)?;
        CommentAuthor::Admin {
            name: admin.name,
            email: state.config.admin_email.clone(),
        }
    } else {
        CommentAuthor::Visitor {
            author: form.author.trim().to_owned(),
            email: form.email.trim().to_owned(),
            site: form.site(),
        }
    };
    let replied_id = match req.queries().get("reply") {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| AppError::NotFound)?),
        None => None,
    };
    let new = NewComment::new(post.id, author, form.body.trim(), replied_id);
    let comment = match Comment::submit(&state.db, &new).await {
        Ok(comment) => comment,
        Err(AppError::CommentsDisabled) => {
            depot.outgoing_flash_mut().warning("Comment disabled.");
            redirect(res, post_url);
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    tracing::info!(comment = comment.id, post = post.id, from_admin, "comment submitted");

    if from_admin {
        depot.outgoing_flash_mut().success("Comment published.");
    } else {
        depot
            .outgoing_flash_mut()
            .info("Thanks, your comment will be published after reviewed.");
        state.notifier.dispatch(state.notifier.new_comment_email(&post));
    }
    if let Some(email) = state.notifier.new_reply_email(&comment) {
        state.notifier.dispatch(email);
    }
    redirect(res, post_url);
    Ok(())
}

#[handler]
async fn reply_comment(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let comment = Comment::get(&state.db, id_param(req, "id")?).await?;
    let post = Post::get(&state.db, comment.post_id).await?;
    if !post.can_comment {
        depot.outgoing_flash_mut().warning("Reply disabled.");
        redirect(res, format!("/post/{}", post.id));
        return Ok(());
    }
    let author: String = form_urlencoded::byte_serialize(comment.author.as_bytes()).collect();
    redirect(
        res,
        format!("/post/{}?reply={}&author={author}#comment-form", post.id, comment.id),
    );
    Ok(())
}

#[handler]
async fn change_theme(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<()> {
    let state = app_state(depot)?;
    let name = req.param::<String>("name").ok_or(AppError::NotFound)?;
    if state.config.theme(&name).is_none() {
        return Err(AppError::NotFound);
    }
    let cookie = Cookie::build((THEME_COOKIE, name))
        .path("/")
        .max_age(time::Duration::days(30))
        .build();
    res.add_cookie(cookie);
    redirect_back(req, res);
    Ok(())
}
