//! Login tokens.
//!
//! A token is handed out once at signup as `user_id:secret:salt`, with the
//! secret and salt in base64. Storage only keeps the argon2 [`TokenDigest`]
//! of the secret, bound to the user and an optional lifetime in an
//! [`Authentication`].

use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{Engine, display::Base64Display, prelude::BASE64_STANDARD};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::UtcDateTime;

const SECRET_LEN: usize = 24;
const SALT_LEN: usize = 18;
pub const DIGEST_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

/// Why a presented token does not log anyone in.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum TokenError {
    #[error("Token is not of the form user_id:secret:salt")]
    Malformed,
    #[error("Token is not known")]
    Unknown,
    #[error("Token was issued to a different user")]
    WrongUser,
    #[error("Token expired at {0:?}")]
    Expired(UtcDateTime),
    #[error("Hashing the token failed: {0}")]
    Digest(argon2::Error),
}

impl TokenError {
    /// The token is bad, as opposed to the server failing to check it.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Digest(_))
    }
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    user_id: Id<UserMarker>,
    secret: [u8; SECRET_LEN],
    salt: [u8; SALT_LEN],
}

impl AuthToken {
    /// A fresh random token for `user_id`.
    #[must_use]
    pub fn issue(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            secret: rand::random(),
            salt: rand::random(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user_id
    }

    /// The credential a client sends after `Bearer `.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}",
            self.user_id,
            Base64Display::new(&self.secret, &BASE64_STANDARD),
            Base64Display::new(&self.salt, &BASE64_STANDARD),
        )
    }

    pub fn decode(credential: &str) -> Result<Self, TokenError> {
        let mut parts = credential.splitn(3, ':');
        let (Some(user_id), Some(secret), Some(salt)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        Ok(Self {
            user_id: user_id
                .parse::<u64>()
                .map_err(|_| TokenError::Malformed)?
                .into(),
            secret: decode_fixed(secret)?,
            salt: decode_fixed(salt)?,
        })
    }

    pub fn digest(&self) -> Result<TokenDigest, TokenError> {
        let mut digest = [0; DIGEST_LEN];
        Argon2::default()
            .hash_password_into(&self.secret, &self.salt, &mut digest)
            .map_err(TokenError::Digest)?;

        Ok(TokenDigest(digest))
    }
}

fn decode_fixed<const N: usize>(part: &str) -> Result<[u8; N], TokenError> {
    BASE64_STANDARD
        .decode(part)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(TokenError::Malformed)
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// The stored form of a token's secret.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct TokenDigest([u8; DIGEST_LEN]);

impl TokenDigest {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for TokenDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenDigest(..)")
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("A token digest must be {DIGEST_LEN} bytes long")]
pub struct InvalidTokenDigestError;

impl TryFrom<&[u8]> for TokenDigest {
    type Error = InvalidTokenDigestError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        value
            .try_into()
            .map(Self)
            .map_err(|_| InvalidTokenDigestError)
    }
}

/// A stored login.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub digest: TokenDigest,
    pub created_at: UtcDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    #[must_use]
    pub fn expires_at(&self) -> Option<UtcDateTime> {
        self.expires_after
            .map(|expires_after| self.created_at + expires_after.get())
    }

    /// The user `token` logs in as at `now`.
    ///
    /// `self` must be the login stored under `token`'s digest.
    pub fn verify(
        &self,
        token: &AuthToken,
        now: UtcDateTime,
    ) -> Result<Id<UserMarker>, TokenError> {
        if token.user_id != self.user {
            return Err(TokenError::WrongUser);
        }

        match self.expires_at() {
            Some(expires_at) if expires_at < now => Err(TokenError::Expired(expires_at)),
            _ => Ok(self.user),
        }
    }
}
