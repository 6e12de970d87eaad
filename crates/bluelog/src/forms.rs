//! Submitted forms and their validation.
//!
//! Every form deserializes from an urlencoded body with missing fields left empty, so
//! validation can report them per field instead of rejecting the whole request.

use std::collections::BTreeMap;

use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_CATEGORY_ID;

/// Messages per field name, rendered next to the inputs.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

fn push(errors: &mut FieldErrors, field: &'static str, message: impl Into<String>) {
    errors.entry(field).or_default().push(message.into());
}

fn required(errors: &mut FieldErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        push(errors, field, "This field is required.");
        false
    } else {
        true
    }
}

fn length(errors: &mut FieldErrors, field: &'static str, value: &str, min: usize, max: usize) {
    if !required(errors, field, value) {
        return;
    }
    let len = value.trim().chars().count();
    if len < min || len > max {
        push(errors, field, format!("Field must be between {min} and {max} characters long."));
    }
}

fn email(errors: &mut FieldErrors, field: &'static str, value: &str, max: usize) {
    length(errors, field, value, 1, max);
    if !value.trim().is_empty() && !EmailAddress::is_valid(value.trim()) {
        push(errors, field, "Invalid email address.");
    }
}

/// Absolute `http`/`https` URL.
#[must_use]
pub fn is_http_url(value: &str) -> bool {
    url::Url::parse(value.trim())
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}

fn http_url(errors: &mut FieldErrors, field: &'static str, value: &str, max: usize) {
    length(errors, field, value, 1, max);
    if !value.trim().is_empty() && !is_http_url(value) {
        push(errors, field, "Invalid URL.");
    }
}

fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[derive(Deserialize, Serialize, Default, Debug)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Checkbox, present when ticked.
    pub remember: Option<String>,
}

impl LoginForm {
    #[must_use]
    pub fn remember(&self) -> bool {
        self.remember.is_some()
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        length(&mut errors, "username", &self.username, 1, 20);
        length(&mut errors, "password", &self.password, 1, 128);
        finish(errors)
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
#[serde(default)]
pub struct SettingForm {
    pub name: String,
    pub blog_title: String,
    pub blog_sub_title: String,
    pub about: String,
}

impl SettingForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        length(&mut errors, "name", &self.name, 1, 30);
        length(&mut errors, "blog_title", &self.blog_title, 1, 60);
        length(&mut errors, "blog_sub_title", &self.blog_sub_title, 1, 100);
        required(&mut errors, "about", &self.about);
        finish(errors)
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub body: String,
    /// Category id as submitted by the select box.
    pub category: String,
}

impl PostForm {
    /// Selected category, the default one when nothing was picked.
    #[must_use]
    pub fn category_id(&self) -> Option<i64> {
        let raw = self.category.trim();
        if raw.is_empty() {
            Some(DEFAULT_CATEGORY_ID)
        } else {
            raw.parse().ok()
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        length(&mut errors, "title", &self.title, 1, 60);
        required(&mut errors, "body", &self.body);
        if self.category_id().is_none() {
            push(&mut errors, "category", "Not a valid choice.");
        }
        finish(errors)
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        length(&mut errors, "name", &self.name, 1, 30);
        finish(errors)
    }
}

/// Visitor comment form. Logged-in admins only fill in `body`.
#[derive(Deserialize, Serialize, Default, Debug)]
#[serde(default)]
pub struct CommentForm {
    pub author: String,
    pub email: String,
    pub site: String,
    pub body: String,
}

impl CommentForm {
    pub fn validate(&self, from_admin: bool) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if !from_admin {
            length(&mut errors, "author", &self.author, 1, 30);
            email(&mut errors, "email", &self.email, 254);
            if !self.site.trim().is_empty() {
                http_url(&mut errors, "site", &self.site, 255);
            }
        }
        required(&mut errors, "body", &self.body);
        finish(errors)
    }

    #[must_use]
    pub fn site(&self) -> Option<String> {
        let site = self.site.trim();
        (!site.is_empty()).then(|| site.to_owned())
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
#[serde(default)]
pub struct LinkForm {
    pub name: String,
    pub url: String,
}

impl LinkForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        length(&mut errors, "name", &self.name, 1, 30);
        http_url(&mut errors, "url", &self.url, 255);
        finish(errors)
    }
}
