//! Rows of the blog database and the queries over them.

pub mod admin;
pub mod category;
pub mod comment;
pub mod link;
pub mod post;

pub use admin::Admin;
pub use category::{Category, CategoryWithCount, DEFAULT_CATEGORY_ID};
pub use comment::{Comment, CommentAuthor, CommentFilter, NewComment};
pub use link::Link;
pub use post::{NewPost, Post};
