use crate::server::{cache::PageCache, templates::Template};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use yatube_common::{
    model::{
        Id,
        auth::TokenError,
        group::GroupSlug,
        post::PostMarker,
        user::UserHandle,
    },
    paginator::Paginator,
};
use yatube_db::{DbError, Store};

pub mod auth;
pub mod cache;
pub mod extract;
pub mod forms;
pub mod paths;
mod routes;
pub mod templates;
pub mod views;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub paginator: Paginator,
    pub index_cache: PageCache,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Submitted form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Bearer token was not accepted: {0}")]
    Token(#[from] TokenError),
    #[error("The handle {0} is already taken")]
    HandleTaken(UserHandle),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Rendering a template failed: {0}")]
    Template(#[from] tera::Error),
    #[error("Templates failed to load: {0}")]
    TemplatesUnavailable(&'static tera::Error),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with handle {0} was not found.")]
    UserByHandleNotFound(UserHandle),
    #[error("Group with slug {0} was not found.")]
    GroupBySlugNotFound(GroupSlug),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByHandleNotFound(_)
            | ServerError::GroupBySlugNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::HandleTaken(_) => StatusCode::CONFLICT,
            ServerError::QueryRejection(_)
            | ServerError::FormRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::Token(TokenError::Malformed) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::Token(TokenError::Digest(_))
            | ServerError::Template(_)
            | ServerError::TemplatesUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Token(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ErrorContext {
    status: u16,
    /// Only filled for client errors; server errors stay opaque.
    detail: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let context = ErrorContext {
            status: status.as_u16(),
            detail: status.is_client_error().then(|| self.to_string()),
        };

        match Template::for_status(status).render(&context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(err) => {
                error!(error = %err, "Rendering the error page failed");
                (status, status.canonical_reason().unwrap_or_default()).into_response()
            }
        }
    }
}
