use crate::{
    error::{AppError, ErrorKind},
    AppState,
};
use argon2::Argon2;
use axum::{
    async_trait,
    extract::{FromRequest, RequestParts, TypedHeader},
    headers::Cookie,
    Extension,
};
use jsonwebtoken::{errors::Result as JwtResult, DecodingKey, EncodingKey, Header, Validation};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SESSION_COOKIE: &str = "admin_session";

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

/// The single admin account, configured through the environment.
pub struct AdminCredentials {
    username: String,
    password_hash: String,
}

impl AdminCredentials {
    /// Fails when `password_hash` is not a PHC string.
    pub fn new(username: &str, password_hash: &str) -> password_hash::Result<Self> {
        PasswordHash::new(password_hash)?;
        Ok(Self {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    pub fn verify(&self, username: &str, password: &str) -> password_hash::Result<bool> {
        let password_ok = verify_password(password, &self.password_hash)?;
        Ok(password_ok && username == self.username)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    cross_site: bool,
}

impl SessionKeys {
    /// `cross_site` marks cookies `SameSite=None; Secure` so a frontend on
    /// another origin can send them back.
    pub fn from_base64_secret(secret: &str, ttl: Duration, cross_site: bool) -> JwtResult<Self> {
        Ok(Self {
            encoding: EncodingKey::from_base64_secret(secret)?,
            decoding: DecodingKey::from_base64_secret(secret)?,
            ttl,
            cross_site,
        })
    }

    pub fn issue(&self, username: &str) -> JwtResult<String> {
        jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                sub: username.to_string(),
                exp: jsonwebtoken::get_current_timestamp() + self.ttl.as_secs(),
            },
            &self.encoding,
        )
    }

    pub fn validate(&self, token: &str) -> JwtResult<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
    }

    pub fn cookie(&self, token: &str) -> String {
        self.cookie_with(token, self.ttl.as_secs())
    }

    pub fn expired_cookie(&self) -> String {
        self.cookie_with("", 0)
    }

    fn cookie_with(&self, value: &str, max_age: u64) -> String {
        let same_site = if self.cross_site {
            "SameSite=None; Secure"
        } else {
            "SameSite=Lax"
        };
        format!("{SESSION_COOKIE}={value}; HttpOnly; Path=/; Max-Age={max_age}; {same_site}")
    }
}

/// Extractor that only succeeds for requests carrying a valid admin session.
pub struct AdminOnly(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for AdminOnly {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(state) = Extension::<AppState>::from_request(req).await?;
        let cookies = TypedHeader::<Cookie>::from_request(req).await.ok();
        let token = cookies
            .as_ref()
            .and_then(|TypedHeader(cookies)| cookies.get(SESSION_COOKIE))
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::new(ErrorKind::Unauthorized, "admin login required"))?;

        let claims = state.sessions.validate(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected admin session");
            AppError::new(ErrorKind::Unauthorized, "session expired, please log in again")
        })?;
        Ok(AdminOnly(claims))
    }
}
