//! Axum extractors and responders whose rejections become [`ServerError`]s.

use crate::server::ServerError;
use axum::{
    Form as AxumForm, Json as AxumJson,
    extract::{FromRequest, FromRequestParts, Query as AxumQuery},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::{Deserialize, Serialize};

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// A urlencoded HTML form body.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumForm), rejection(ServerError))]
pub struct Form<T>(pub T);

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// The `?page=` parameter of listing pages, kept raw so that garbage still
/// resolves to a page instead of failing the request.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
}

impl PageQuery {
    #[must_use]
    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }
}
