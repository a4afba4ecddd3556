use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::debug;
use yatube_common::model::{
    Id,
    auth::{AuthToken, TokenError},
    user::{User, UserMarker},
};
use yatube_db::Store;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The user a valid bearer token belongs to.
///
/// Required, a missing or rejected token fails the request. As an `Option`
/// such requests are served as anonymous.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new(user: User) -> Self {
        Self { user }
    }

    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?;
        let token = AuthToken::decode(bearer.token())?;

        let store = Arc::<dyn Store>::from_ref(state);
        let user_id = store
            .fetch_auth(&token.digest()?)
            .await?
            .ok_or(TokenError::Unknown)?
            .verify(&token, UtcDateTime::now())?;
        let user = store
            .fetch_user(user_id)
            .await?
            .ok_or(TokenError::Unknown)?;

        Ok(Self { user })
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    /// Anyone whose credentials are missing or rejected is anonymous.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }

        match <Self as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(user) => Ok(Some(user)),
            Err(ServerError::Token(err)) if err.is_rejection() => {
                debug!(error = %err, "Treating request with rejected token as anonymous");
                Ok(None)
            }
            Err(ServerError::InvalidAuthorizationHeader(rejection)) => {
                debug!(error = %rejection, "Treating request with bad authorization as anonymous");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{ServerError, auth::AuthenticatedUser};
    use axum::{
        extract::{FromRequestParts, OptionalFromRequestParts},
        http::{Request, StatusCode, header::AUTHORIZATION, request::Parts},
    };
    use std::sync::Arc;
    use time::Duration;
    use yatube_common::{
        model::{
            Id,
            auth::AuthToken,
            user::{CreateUser, User, UserHandle},
        },
        util::PositiveDuration,
    };
    use yatube_db::{MemoryStore, Store};

    fn parts(authorization: Option<&str>) -> Parts {
        let mut request = Request::builder().uri("/");
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        request.body(()).unwrap().into_parts().0
    }

    async fn required(
        store: &Arc<dyn Store>,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedUser, ServerError> {
        <AuthenticatedUser as FromRequestParts<_>>::from_request_parts(
            &mut parts(authorization),
            store,
        )
        .await
    }

    async fn optional(
        store: &Arc<dyn Store>,
        authorization: Option<&str>,
    ) -> Result<Option<AuthenticatedUser>, ServerError> {
        <AuthenticatedUser as OptionalFromRequestParts<_>>::from_request_parts(
            &mut parts(authorization),
            store,
        )
        .await
    }

    async fn login(
        store: &Arc<dyn Store>,
        handle: &str,
        expires_after: Option<Duration>,
    ) -> (User, String) {
        let user = store
            .create_user(&CreateUser {
                handle: UserHandle::new(handle.to_owned()).unwrap(),
            })
            .await
            .unwrap();
        let token = AuthToken::issue(user.id);
        store
            .create_auth(
                user.id,
                &token.digest().unwrap(),
                expires_after.and_then(PositiveDuration::new),
            )
            .await
            .unwrap();

        (user, format!("Bearer {}", token.encode()))
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let (user, bearer) = login(&store, "leo", None).await;

        let authenticated = required(&store, Some(&bearer)).await.unwrap();
        assert_eq!(authenticated.user(), &user);

        let authenticated = optional(&store, Some(&bearer)).await.unwrap();
        assert_eq!(authenticated.as_ref().map(AuthenticatedUser::user), Some(&user));
    }

    #[tokio::test]
    async fn required_login_rejects_bad_credentials() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let unknown = AuthToken::issue(Id::from(1_u64));
        let (_, expired) = login(&store, "leo", Some(Duration::nanoseconds(1))).await;

        for (authorization, status) in [
            (None, StatusCode::UNAUTHORIZED),
            (
                Some(format!("Bearer {}", unknown.encode())),
                StatusCode::UNAUTHORIZED,
            ),
            (Some(expired), StatusCode::UNAUTHORIZED),
            (Some("Bearer nope".to_owned()), StatusCode::BAD_REQUEST),
            (Some("Basic bGVvOmxlbw==".to_owned()), StatusCode::BAD_REQUEST),
        ] {
            let error = required(&store, authorization.as_deref())
                .await
                .unwrap_err();
            assert_eq!(error.status(), status, "{authorization:?}");
        }
    }

    #[tokio::test]
    async fn token_of_another_user_is_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let (leo, _) = login(&store, "leo", None).await;
        let (mia, _) = login(&store, "mia", None).await;

        let token = AuthToken::issue(leo.id);
        store
            .create_auth(mia.id, &token.digest().unwrap(), None)
            .await
            .unwrap();
        let bearer = format!("Bearer {}", token.encode());

        let error = required(&store, Some(&bearer)).await.unwrap_err();
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn optional_login_treats_bad_credentials_as_anonymous() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let unknown = format!("Bearer {}", AuthToken::issue(Id::from(1_u64)).encode());

        for authorization in [None, Some(unknown.as_str()), Some("Bearer nope"), Some("Basic x")] {
            assert_eq!(
                optional(&store, authorization).await.unwrap(),
                None,
                "{authorization:?}"
            );
        }
    }
}
