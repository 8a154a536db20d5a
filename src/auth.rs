use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{NaiveDateTime, Utc};
use rand::RngCore;

use std::future::Future;
use std::pin::Pin;

use crate::db::{self, DbPool};
use crate::errors::UserError;
use crate::model::User;

pub const SESSION_COOKIE: &str = "catcollector_session";

/// How long a session stays valid after sign in.
pub const SESSION_TTL_DAYS: i64 = 14;

/// Hashes a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            UserError::UnexpectedError
        })
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Sessions created before this instant are expired.
pub fn session_cutoff() -> NaiveDateTime {
    Utc::now().naive_utc() - chrono::Duration::days(SESSION_TTL_DAYS)
}

pub fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

async fn resolve(req: &HttpRequest) -> Result<Option<User>, UserError> {
    let Some(token) = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };
    let pool = req.app_data::<web::Data<DbPool>>().cloned().ok_or_else(|| {
        error!("Database pool missing from app data");
        UserError::UnexpectedError
    })?;

    let not_before = session_cutoff();
    db::run(&pool, move |conn| db::user_for_session(conn, &token, not_before)).await
}

/// The user behind the request, if any.
pub struct Principal(pub Option<User>);

impl FromRequest for Principal {
    type Error = UserError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { resolve(&req).await.map(Principal) })
    }
}

/// A signed-in user. Extraction fails with `UnauthorizedError` before the
/// handler body runs.
pub struct Authenticated(pub User);

impl FromRequest for Authenticated {
    type Error = UserError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            match resolve(&req).await? {
                Some(user) => Ok(Authenticated(user)),
                None => {
                    info!("Rejected anonymous request to {}", req.path());
                    Err(UserError::UnauthorizedError)
                }
            }
        })
    }
}
