use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::auth::{self, Principal, SESSION_COOKIE};
use crate::db::{self, DbPool};
use crate::errors::UserError;
use crate::forms::{LoginForm, SignupForm};
use crate::model::{NewUser, Session};
use crate::views::{render, render_with, Templates};

pub const INVALID_SIGNUP: &str = "Invalid sign up - try again";
pub const INVALID_LOGIN: &str = "Invalid username or password";

/// Where a freshly signed-in user lands.
const HOME_LISTING: &str = "/cats/";

fn signed_in_redirect(token: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, HOME_LISTING))
        .cookie(auth::session_cookie(token))
        .finish()
}

pub async fn signup_form(hb: web::Data<Templates>, principal: Principal) -> Result<HttpResponse, UserError> {
    render(&hb, "registration/signup", &json!({ "user": principal.0 }))
}

pub async fn signup(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    form: web::Form<SignupForm>,
) -> Result<HttpResponse, UserError> {
    let invalid = || {
        render_with(
            HttpResponse::BadRequest(),
            &hb,
            "registration/signup",
            &json!({ "user": null, "username": form.username, "error_message": INVALID_SIGNUP }),
        )
    };

    let username = match form.check() {
        Ok(username) => username,
        Err(_) => return invalid(),
    };

    let password = form.password1.clone();
    let password_hash = web::block(move || auth::hash_password(&password))
        .await
        .map_err(|_| {
            error!("Blocking Thread Pool Error");
            UserError::UnexpectedError
        })??;

    let token = auth::new_session_token();
    let session_token = token.clone();
    let new_user = NewUser { username, password_hash };

    let created = db::run(&pool, move |conn| db::register_user(conn, &new_user, &session_token)).await?;

    match created {
        Some(user) => {
            info!("New account {} signed up", user.username);
            Ok(signed_in_redirect(&token))
        }
        None => {
            info!("Sign up refused for taken username {}", form.username.trim());
            invalid()
        }
    }
}

pub async fn login_form(hb: web::Data<Templates>, principal: Principal) -> Result<HttpResponse, UserError> {
    render(&hb, "registration/login", &json!({ "user": principal.0 }))
}

pub async fn login(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, UserError> {
    let LoginForm { username, password } = form.into_inner();
    let token = auth::new_session_token();
    let session_token = token.clone();
    let lookup = username.trim().to_string();
    let not_before = auth::session_cutoff();

    let user = db::run(&pool, move |conn| {
        let user = match db::find_user_by_username(conn, &lookup)? {
            Some(user) if auth::verify_password(&password, &user.password_hash) => user,
            _ => return Ok(None),
        };
        let purged = db::delete_expired_sessions(conn, not_before)?;
        if purged > 0 {
            debug!("Purged {} expired session(s)", purged);
        }
        db::create_session(conn, &Session::starting_now(&session_token, user.id))?;
        Ok(Some(user))
    })
    .await?;

    match user {
        Some(user) => {
            info!("User {} logged in", user.username);
            Ok(signed_in_redirect(&token))
        }
        None => render_with(
            HttpResponse::BadRequest(),
            &hb,
            "registration/login",
            &json!({ "user": null, "username": username, "error_message": INVALID_LOGIN }),
        ),
    }
}

pub async fn logout(pool: web::Data<DbPool>, req: HttpRequest) -> Result<HttpResponse, UserError> {
    if let Some(token) = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()) {
        db::run(&pool, move |conn| db::delete_session(conn, &token)).await?;
    }

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(auth::removal_cookie())
        .finish())
}
