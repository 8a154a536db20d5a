use actix_web::{web, HttpResponse};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use std::fs;
use std::path::PathBuf;

use crate::auth::Authenticated;
use crate::db::{self, DbPool};
use crate::errors::UserError;
use crate::forms::{CatForm, CatUpdateForm, FeedingForm};
use crate::handlers::INVALID_FORM;
use crate::model::{Cat, MealType, NewPhoto, Photo, Toy, User};
use crate::storage::{object_key, ObjectStore, StorageError, UploadDir};
use crate::views::{cat_detail_url, redirect, render, render_with, Templates};

/// Multipart field carrying the uploaded photo.
pub const PHOTO_FIELD: &str = "photo-file";

#[derive(Deserialize, Validate)]
pub struct CatPath {
    #[validate(range(min = 1))]
    cat_id: i32,
}

#[derive(Deserialize, Validate)]
pub struct CatToyPath {
    #[validate(range(min = 1))]
    cat_id: i32,
    #[validate(range(min = 1))]
    toy_id: i32,
}

#[derive(Serialize)]
struct FeedingRow {
    date: String,
    meal: &'static str,
}

#[derive(Serialize)]
struct CatDetail {
    cat: Cat,
    cat_toys: Vec<Toy>,
    toys: Vec<Toy>,
    feedings: Vec<FeedingRow>,
    photos: Vec<Photo>,
    fed_for_today: bool,
}

fn meal_choices() -> Vec<serde_json::Value> {
    MealType::ALL
        .iter()
        .map(|m| json!({ "code": m.code(), "label": m.label() }))
        .collect()
}

async fn owned_cat(pool: &DbPool, cat_id: i32, user: &User) -> Result<Cat, UserError> {
    let owner_id = user.id;
    db::run(pool, move |conn| db::find_cat(conn, cat_id, owner_id))
        .await
        .map_err(|e| {
            if e == UserError::NotFoundError {
                warn!("Cat ID: {} not found for user {}", cat_id, owner_id);
            }
            e
        })
}

pub async fn cats_index(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    Authenticated(user): Authenticated,
) -> Result<HttpResponse, UserError> {
    let owner_id = user.id;
    let cats = db::run(&pool, move |conn| db::cats_for_owner(conn, owner_id)).await?;

    render(&hb, "cats/index", &json!({ "user": user, "cats": cats }))
}

pub async fn cat_detail(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    Authenticated(user): Authenticated,
    path: web::Path<CatPath>,
) -> Result<HttpResponse, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;

    let cat = owned_cat(&pool, path.cat_id, &user).await?;
    let cat_id = cat.id;
    let today = Local::now().date_naive();

    let detail = db::run(&pool, move |conn| {
        let feedings = db::feedings_for_cat(conn, cat_id)?
            .into_iter()
            .map(|f| FeedingRow {
                date: f.date.format("%Y-%m-%d").to_string(),
                meal: f.meal_label(),
            })
            .collect();

        Ok(CatDetail {
            cat_toys: db::cat_toys(conn, cat_id)?,
            toys: db::toys_not_on_cat(conn, cat_id)?,
            feedings,
            photos: db::photos_for_cat(conn, cat_id)?,
            fed_for_today: db::fed_for_today(conn, cat_id, today)?,
            cat,
        })
    })
    .await?;

    render(
        &hb,
        "cats/detail",
        &json!({
            "user": user,
            "cat": detail.cat,
            "cat_toys": detail.cat_toys,
            "toys": detail.toys,
            "feedings": detail.feedings,
            "photos": detail.photos,
            "fed_for_today": detail.fed_for_today,
            "meals": meal_choices(),
        }),
    )
}

pub async fn new_cat_form(
    hb: web::Data<Templates>,
    Authenticated(user): Authenticated,
) -> Result<HttpResponse, UserError> {
    render(
        &hb,
        "cats/form",
        &json!({ "user": user, "action": "/cats/new", "form": CatForm::default() }),
    )
}

pub async fn create_cat(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    Authenticated(user): Authenticated,
    form: web::Form<CatForm>,
) -> Result<HttpResponse, UserError> {
    let new_cat = match form.to_new_cat(user.id) {
        Ok(new_cat) => new_cat,
        Err(_) => {
            return render_with(
                HttpResponse::BadRequest(),
                &hb,
                "cats/form",
                &json!({
                    "user": user,
                    "action": "/cats/new",
                    "form": form.into_inner(),
                    "error_message": INVALID_FORM,
                }),
            );
        }
    };

    let cat = db::run(&pool, move |conn| db::create_cat(conn, &new_cat)).await?;
    info!("User {} added cat {} ({})", user.username, cat.id, cat.name);

    Ok(redirect(&cat_detail_url(cat.id)))
}

pub async fn edit_cat_form(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    Authenticated(user): Authenticated,
    path: web::Path<CatPath>,
) -> Result<HttpResponse, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;
    let cat = owned_cat(&pool, path.cat_id, &user).await?;

    let form = CatUpdateForm {
        breed: cat.breed.clone(),
        description: cat.description.clone(),
        age: cat.age.to_string(),
    };
    render(
        &hb,
        "cats/form",
        &json!({
            "user": user,
            "action": format!("/cats/{}/edit", cat.id),
            "cat": cat,
            "form": form,
        }),
    )
}

pub async fn update_cat(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    Authenticated(user): Authenticated,
    path: web::Path<CatPath>,
    form: web::Form<CatUpdateForm>,
) -> Result<HttpResponse, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;
    let cat = owned_cat(&pool, path.cat_id, &user).await?;

    let changes = match form.to_changes() {
        Ok(changes) => changes,
        Err(_) => {
            return render_with(
                HttpResponse::BadRequest(),
                &hb,
                "cats/form",
                &json!({
                    "user": user,
                    "action": format!("/cats/{}/edit", cat.id),
                    "cat": cat,
                    "form": form.into_inner(),
                    "error_message": INVALID_FORM,
                }),
            );
        }
    };

    let (cat_id, owner_id) = (cat.id, user.id);
    let cat = db::run(&pool, move |conn| db::update_cat(conn, cat_id, owner_id, &changes)).await?;

    Ok(redirect(&cat_detail_url(cat.id)))
}

pub async fn confirm_delete_cat(
    pool: web::Data<DbPool>,
    hb: web::Data<Templates>,
    Authenticated(user): Authenticated,
    path: web::Path<CatPath>,
) -> Result<HttpResponse, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;
    let cat = owned_cat(&pool, path.cat_id, &user).await?;

    render(&hb, "cats/confirm_delete", &json!({ "user": user, "cat": cat }))
}

pub async fn delete_cat(
    pool: web::Data<DbPool>,
    Authenticated(user): Authenticated,
    path: web::Path<CatPath>,
) -> Result<HttpResponse, UserError> {
    let (cat_id, owner_id) = (path.cat_id, user.id);

    let deleted = db::run(&pool, move |conn| db::delete_cat(conn, cat_id, owner_id)).await?;
    if deleted {
        info!("User {} deleted cat {}", user.username, cat_id);
    } else {
        info!("User {} has no cat {} to delete", user.username, cat_id);
    }

    Ok(redirect("/cats/"))
}

pub async fn assoc_toy(
    pool: web::Data<DbPool>,
    Authenticated(user): Authenticated,
    path: web::Path<CatToyPath>,
) -> Result<HttpResponse, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;
    let cat = owned_cat(&pool, path.cat_id, &user).await?;

    let (cat_id, toy_id) = (cat.id, path.toy_id);
    db::run(&pool, move |conn| db::add_toy_to_cat(conn, cat_id, toy_id))
        .await
        .map_err(|e| {
            if e == UserError::NotFoundError {
                warn!("Toy ID: {} not found", toy_id);
            }
            e
        })?;

    Ok(redirect(&cat_detail_url(cat_id)))
}

pub async fn add_feeding(
    pool: web::Data<DbPool>,
    Authenticated(user): Authenticated,
    path: web::Path<CatPath>,
    form: web::Form<FeedingForm>,
) -> Result<HttpResponse, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;
    let cat = owned_cat(&pool, path.cat_id, &user).await?;

    match form.to_new_feeding(cat.id) {
        Ok(new_feeding) => {
            db::run(&pool, move |conn| db::add_feeding(conn, &new_feeding)).await?;
        }
        Err(_) => info!("Discarded invalid feeding for cat {}", cat.id),
    }

    Ok(redirect(&cat_detail_url(cat.id)))
}

/// Moves the received file into its own scratch directory and reads it back.
/// Blocking; run it on the thread pool.
fn read_upload(scratch: PathBuf, file: awmp::File) -> Result<(PathBuf, Vec<u8>), StorageError> {
    // each upload gets its own directory so equal file names never collide
    let dir = scratch.join(format!("photo-{}", uuid::Uuid::new_v4().simple()));
    fs::create_dir_all(&dir).map_err(|e| StorageError::Read(e.to_string()))?;

    let read = file
        .persist_in(&dir)
        .map_err(|_| StorageError::Read("could not persist multipart file".to_string()))
        .and_then(|path| {
            fs::read(&path)
                .map(|bytes| (path, bytes))
                .map_err(|e| StorageError::Read(e.to_string()))
        });
    if let Err(e) = fs::remove_dir_all(&dir) {
        warn!("Could not remove {}: {}", dir.display(), e);
    }
    read
}

/// Stores the uploaded file and returns its public URL. `None` when the
/// submitted file is empty.
async fn upload_photo(
    store: &dyn ObjectStore,
    scratch: &UploadDir,
    file: awmp::File,
) -> Result<Option<String>, StorageError> {
    let scratch = scratch.0.clone();
    let (path, bytes) = web::block(move || read_upload(scratch, file))
        .await
        .map_err(|_| StorageError::Read("blocking thread pool unavailable".to_string()))??;
    if bytes.is_empty() {
        return Ok(None);
    }

    let key = object_key(&path);
    store.upload(&key, bytes).await?;
    Ok(Some(store.public_url(&key)))
}

/// Best effort: upload or bookkeeping failures are logged and the user is
/// sent back to the cat page either way.
pub async fn add_photo(
    pool: web::Data<DbPool>,
    store: web::Data<dyn ObjectStore>,
    scratch: web::Data<UploadDir>,
    Authenticated(user): Authenticated,
    path: web::Path<CatPath>,
    parts: Option<awmp::Parts>,
) -> Result<HttpResponse, UserError> {
    path.validate().map_err(|_| UserError::NotFoundError)?;
    let cat = owned_cat(&pool, path.cat_id, &user).await?;
    let cat_id = cat.id;

    // a body that is not multipart at all carries no file either
    let Some(file) = parts.and_then(|mut parts| parts.files.take(PHOTO_FIELD).pop()) else {
        debug!("No photo submitted for cat {}", cat_id);
        return Ok(redirect(&cat_detail_url(cat_id)));
    };

    match upload_photo(store.get_ref(), &scratch, file).await {
        Ok(Some(url)) => {
            let saved = db::run(&pool, move |conn| db::add_photo(conn, &NewPhoto { url, cat_id })).await;
            if let Err(e) = saved {
                error!("Uploaded photo for cat {} but could not record it: {}", cat_id, e);
            }
        }
        Ok(None) => debug!("Empty photo upload for cat {}", cat_id),
        Err(e) => error!("Photo upload for cat {} failed: {}", cat_id, e),
    }

    Ok(redirect(&cat_detail_url(cat_id)))
}
