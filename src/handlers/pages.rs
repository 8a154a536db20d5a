use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

use crate::auth::Principal;
use crate::errors::UserError;
use crate::views::{render, Templates};

pub async fn home(hb: web::Data<Templates>, principal: Principal) -> Result<HttpResponse, UserError> {
    render(&hb, "home", &json!({ "user": principal.0 }))
}

pub async fn about(hb: web::Data<Templates>, principal: Principal) -> Result<HttpResponse, UserError> {
    render(&hb, "about", &json!({ "user": principal.0 }))
}

#[get("/health")]
pub async fn status() -> impl Responder {
    HttpResponse::Ok().body("Healthy")
}
