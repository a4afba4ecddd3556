//! HTML rendering. Templates are compiled into the binary and parsed once.

use crate::server::{Result, ServerError};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use std::sync::LazyLock;
use tera::{Context, Tera};

static TEMPLATES: LazyLock<Result<Tera, tera::Error>> = LazyLock::new(load_templates);

fn load_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates([
        ("base.html", include_str!("../../templates/base.html")),
        (
            "includes/post_card.html",
            include_str!("../../templates/includes/post_card.html"),
        ),
        (
            "includes/paginator.html",
            include_str!("../../templates/includes/paginator.html"),
        ),
        (
            Template::Index.name(),
            include_str!("../../templates/posts/index.html"),
        ),
        (
            Template::GroupList.name(),
            include_str!("../../templates/posts/group_list.html"),
        ),
        (
            Template::Profile.name(),
            include_str!("../../templates/posts/profile.html"),
        ),
        (
            Template::PostDetail.name(),
            include_str!("../../templates/posts/post_detail.html"),
        ),
        (
            Template::CreatePost.name(),
            include_str!("../../templates/posts/create_post.html"),
        ),
        (
            Template::Follow.name(),
            include_str!("../../templates/posts/follow.html"),
        ),
        (
            Template::BadRequest.name(),
            include_str!("../../templates/core/400.html"),
        ),
        (
            Template::Unauthorized.name(),
            include_str!("../../templates/core/401.html"),
        ),
        (
            Template::NotFound.name(),
            include_str!("../../templates/core/404.html"),
        ),
        (
            Template::InternalError.name(),
            include_str!("../../templates/core/500.html"),
        ),
    ])?;

    Ok(tera)
}

/// The parsed template set. Fails if any embedded template does not parse.
pub fn engine() -> Result<&'static Tera, &'static tera::Error> {
    TEMPLATES.as_ref()
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Template {
    Index,
    GroupList,
    Profile,
    PostDetail,
    CreatePost,
    Follow,
    BadRequest,
    Unauthorized,
    NotFound,
    InternalError,
}

impl Template {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Index => "posts/index.html",
            Self::GroupList => "posts/group_list.html",
            Self::Profile => "posts/profile.html",
            Self::PostDetail => "posts/post_detail.html",
            Self::CreatePost => "posts/create_post.html",
            Self::Follow => "posts/follow.html",
            Self::BadRequest => "core/400.html",
            Self::Unauthorized => "core/401.html",
            Self::NotFound => "core/404.html",
            Self::InternalError => "core/500.html",
        }
    }

    /// The error page shown for a response with `status`.
    #[must_use]
    pub fn for_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::NOT_FOUND => Self::NotFound,
            status if status.is_client_error() => Self::BadRequest,
            _ => Self::InternalError,
        }
    }

    pub fn render<C: Serialize>(self, context: &C) -> Result<String> {
        let context = Context::from_serialize(context)?;
        let html = engine()
            .map_err(ServerError::TemplatesUnavailable)?
            .render(self.name(), &context)?;

        Ok(html)
    }
}

/// A template together with the context it is rendered with.
///
/// Views return these instead of HTML so the chosen template and the context
/// values stay inspectable.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct TemplateResponse<C> {
    pub template: Template,
    pub context: C,
}

impl<C: Serialize> TemplateResponse<C> {
    #[must_use]
    pub fn new(template: Template, context: C) -> Self {
        Self { template, context }
    }

    pub fn render(&self) -> Result<String> {
        self.template.render(&self.context)
    }
}

impl<C: Serialize> IntoResponse for TemplateResponse<C> {
    fn into_response(self) -> Response {
        match self.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => err.into_response(),
        }
    }
}
