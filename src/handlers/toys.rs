use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::auth::Principal;
use crate::db::{self, DbPool};
use crate::errors::UserError;
use crate::forms::ToyForm;
use crate::handlers::INVALID_FORM;
use crate::model::Toy;
use crate::views::{redirect, render, render_with, toy_detail_url, Templates};

#[derive(Deserialize, Validate)]
pub struct ToyPath {
    #[validate(range(min = 1))]
    toy_id: i32,
}

async fn load_toy(pool: &DbPool, path: &ToyPath) -> Result<Toy, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;
    let toy_id = path.toy_id;

    db::run(pool, move |conn| db::find_toy(conn, toy_id))
        .await
        .map_err(|e| {
            if e == UserError::NotFoundError {
                warn!("Toy ID: {} not found", toy_id);
            }
            e
        })
}

pub async fn toys_index(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    principal: Principal,
) -> Result<HttpResponse, UserError> {
    let toys = db::run(&pool, db::all_toys).await?;

    render(&hb, "toys/index", &json!({ "user": principal.0, "toys": toys }))
}

pub async fn toy_detail(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    principal: Principal,
    path: web::Path<ToyPath>,
) -> Result<HttpResponse, UserError> {
    let toy = load_toy(&pool, &path).await?;

    render(&hb, "toys/detail", &json!({ "user": principal.0, "toy": toy }))
}

pub async fn new_toy_form(
    hb: web::Data<Templates>,
    principal: Principal,
) -> Result<HttpResponse, UserError> {
    render(
        &hb,
        "toys/form",
        &json!({ "user": principal.0, "action": "/toys/new", "form": ToyForm::default() }),
    )
}

pub async fn create_toy(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    principal: Principal,
    form: web::Form<ToyForm>,
) -> Result<HttpResponse, UserError> {
    let new_toy = match form.to_new_toy() {
        Ok(new_toy) => new_toy,
        Err(_) => {
            return render_with(
                HttpResponse::BadRequest(),
                &hb,
                "toys/form",
                &json!({
                    "user": principal.0,
                    "action": "/toys/new",
                    "form": form.into_inner(),
                    "error_message": INVALID_FORM,
                }),
            );
        }
    };

    let toy = db::run(&pool, move |conn| db::create_toy(conn, &new_toy)).await?;
    info!("Added toy {} ({})", toy.id, toy.name);

    Ok(redirect(&toy_detail_url(toy.id)))
}

pub async fn edit_toy_form(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    principal: Principal,
    path: web::Path<ToyPath>,
) -> Result<HttpResponse, UserError> {
    let toy = load_toy(&pool, &path).await?;

    let form = ToyForm {
        name: toy.name.clone(),
        color: toy.color.clone(),
    };
    render(
        &hb,
        "toys/form",
        &json!({
            "user": principal.0,
            "action": format!("/toys/{}/edit", toy.id),
            "toy": toy,
            "form": form,
        }),
    )
}

pub async fn update_toy(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    principal: Principal,
    path: web::Path<ToyPath>,
    form: web::Form<ToyForm>,
) -> Result<HttpResponse, UserError> {
    let toy = load_toy(&pool, &path).await?;

    let changes = match form.to_new_toy() {
        Ok(changes) => changes,
        Err(_) => {
            return render_with(
                HttpResponse::BadRequest(),
                &hb,
                "toys/form",
                &json!({
                    "user": principal.0,
                    "action": format!("/toys/{}/edit", toy.id),
                    "toy": toy,
                    "form": form.into_inner(),
                    "error_message": INVALID_FORM,
                }),
            );
        }
    };

    let toy_id = toy.id;
    let toy = db::run(&pool, move |conn| db::update_toy(conn, toy_id, &changes)).await?;

    Ok(redirect(&toy_detail_url(toy.id)))
}

pub async fn confirm_delete_toy(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    principal: Principal,
    path: web::Path<ToyPath>,
) -> Result<HttpResponse, UserError> {
    let toy = load_toy(&pool, &path).await?;

    render(&hb, "toys/confirm_delete", &json!({ "user": principal.0, "toy": toy }))
}

pub async fn delete_toy(
    pool: web::Data<DbPool>,
    path: web::Path<ToyPath>,
) -> Result<HttpResponse, UserError> {
    let toy_id = path.toy_id;

    if db::run(&pool, move |conn| db::delete_toy(conn, toy_id)).await? {
        info!("Deleted toy {}", toy_id);
    }

    Ok(redirect("/toys/"))
}

#[cfg(test)]
mod tests {
    use actix_web::http::{header, StatusCode};
    use actix_web::test;
    use std::sync::Arc;

    use crate::db;
    use crate::testing::{insert_cat, insert_toy, sign_in, test_app, test_pool, MemoryStore};

    #[actix_web::test]
    async fn toys_are_a_shared_catalog() {
        let pool = test_pool();
        {
            let mut conn = pool.get().unwrap();
            insert_toy(&mut conn, "Mouse", "grey");
        }
        let app = test_app!(pool, Arc::new(MemoryStore::default()));

        let req = test::TestRequest::get().uri("/toys/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("Mouse"));
    }

    #[actix_web::test]
    async fn create_update_and_delete_toy() {
        let pool = test_pool();
        let app = test_app!(pool, Arc::new(MemoryStore::default()));

        let req = test::TestRequest::post()
            .uri("/toys/new")
            .set_form([("name", "Ball"), ("color", "red")])
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let toy = {
            let mut conn = pool.get().unwrap();
            let toys = db::all_toys(&mut conn).unwrap();
            assert_eq!(toys.len(), 1);
            toys[0].clone()
        };
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            format!("/toys/{}/", toy.id).as_str()
        );

        let req = test::TestRequest::post()
            .uri(&format!("/toys/{}/edit", toy.id))
            .set_form([("name", "Big Ball"), ("color", "blue")])
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        {
            let mut conn = pool.get().unwrap();
            let updated = db::find_toy(&mut conn, toy.id).unwrap();
            assert_eq!(updated.name, "Big Ball");
            assert_eq!(updated.color, "blue");
        }

        let req = test::TestRequest::post()
            .uri(&format!("/toys/{}/delete", toy.id))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/toys/");

        let req = test::TestRequest::get()
            .uri(&format!("/toys/{}/", toy.id))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn invalid_toy_is_not_saved() {
        let pool = test_pool();
        let app = test_app!(pool, Arc::new(MemoryStore::default()));

        let req = test::TestRequest::post()
            .uri("/toys/new")
            .set_form([("name", ""), ("color", "red")])
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut conn = pool.get().unwrap();
        assert!(db::all_toys(&mut conn).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn deleting_a_toy_unlinks_it_from_cats() {
        let pool = test_pool();
        let (alice, _) = sign_in(&pool, "alice");
        let (fig, mouse) = {
            let mut conn = pool.get().unwrap();
            let fig = insert_cat(&mut conn, "Fig", alice.id);
            let mouse = insert_toy(&mut conn, "Mouse", "grey");
            db::add_toy_to_cat(&mut conn, fig.id, mouse.id).unwrap();
            (fig, mouse)
        };
        let app = test_app!(pool, Arc::new(MemoryStore::default()));

        let req = test::TestRequest::post()
            .uri(&format!("/toys/{}/delete", mouse.id))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let mut conn = pool.get().unwrap();
        assert!(db::cat_toys(&mut conn, fig.id).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn css_in_toy_colour_is_refused() {
        let pool = test_pool();
        let app = test_app!(pool, Arc::new(MemoryStore::default()));

        let req = test::TestRequest::post()
            .uri("/toys/new")
            .set_form([("name", "Ball"), ("color", "red;background:url(x)")])
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut conn = pool.get().unwrap();
        assert!(db::all_toys(&mut conn).unwrap().is_empty());
    }
}
