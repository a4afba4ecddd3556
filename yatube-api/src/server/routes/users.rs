use crate::server::{Result, ServerError, ServerRouter, extract::Json, paths::SignupPath};
use axum::extract::State;
use axum_extra::routing::RouterExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use yatube_common::model::{
    auth::AuthToken,
    user::{CreateUser, UNIQUE_HANDLE_CONSTRAINT, User},
};
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(signup)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct SignupResponse {
    user: User,
    token: String,
}

/// Registers a user and hands out a bearer token that never expires.
async fn signup(
    SignupPath(): SignupPath,
    State(db): State<Arc<dyn Store>>,
    Json(create_user): Json<CreateUser>,
) -> Result<Json<SignupResponse>> {
    let user = db.create_user(&create_user).await.map_err(|err| {
        if err.is_unique_violation(UNIQUE_HANDLE_CONSTRAINT) {
            ServerError::HandleTaken(create_user.handle.clone())
        } else {
            err.into()
        }
    })?;

    let token = AuthToken::issue(user.id);
    db.create_auth(user.id, &token.digest()?, None).await?;
    info!(user_id = %user.id, handle = %user.handle, "Signed up");

    Ok(Json(SignupResponse {
        user,
        token: token.encode(),
    }))
}
