use actix_web::cookie::Cookie;
use async_trait::async_trait;
use diesel::sqlite::SqliteConnection;

use std::sync::Mutex;

use crate::auth;
use crate::db::{self, DbPool};
use crate::model::*;
use crate::storage::{compose_url, ObjectStore, StorageError};

/// A fresh migrated database. One connection, so every checkout sees the
/// same in-memory data.
pub fn test_pool() -> DbPool {
    db::build_pool(":memory:", 1).unwrap()
}

pub fn insert_user(conn: &mut SqliteConnection, username: &str) -> User {
    db::create_user(
        conn,
        &NewUser {
            username: username.to_string(),
            password_hash: auth::hash_password("password123").unwrap(),
        },
    )
    .unwrap()
}

pub fn insert_cat(conn: &mut SqliteConnection, name: &str, owner_id: i32) -> Cat {
    db::create_cat(
        conn,
        &NewCat {
            name: name.to_string(),
            breed: "tabby".to_string(),
            description: "shy".to_string(),
            age: 2,
            user_id: owner_id,
        },
    )
    .unwrap()
}

pub fn insert_toy(conn: &mut SqliteConnection, name: &str, color: &str) -> Toy {
    db::create_toy(
        conn,
        &NewToy {
            name: name.to_string(),
            color: color.to_string(),
        },
    )
    .unwrap()
}

/// Creates `username` with a live session and returns the cookie for it.
pub fn sign_in(pool: &DbPool, username: &str) -> (User, Cookie<'static>) {
    let mut conn = pool.get().unwrap();
    let user = insert_user(&mut conn, username);
    let token = auth::new_session_token();
    db::create_session(&mut conn, &Session::starting_now(&token, user.id)).unwrap();
    (user, auth::session_cookie(&token))
}

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.objects.lock().unwrap().push((key.to_string(), bytes));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        compose_url("https://bucket.example.test/", "catcollector", key)
    }
}

pub struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
    async fn upload(&self, _key: &str, _bytes: Vec<u8>) -> Result<(), StorageError> {
        Err(StorageError::Status(503))
    }

    fn public_url(&self, key: &str) -> String {
        compose_url("https://bucket.example.test/", "catcollector", key)
    }
}

macro_rules! test_app {
    ($pool:expr, $store:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($pool.clone()))
                .app_data(actix_web::web::Data::<dyn $crate::storage::ObjectStore>::from({
                    let store: std::sync::Arc<dyn $crate::storage::ObjectStore> = $store;
                    store
                }))
                .app_data(actix_web::web::Data::new(
                    $crate::views::load_templates().unwrap(),
                ))
                .app_data(actix_web::web::Data::new($crate::storage::UploadDir(
                    std::env::temp_dir(),
                )))
                .configure($crate::app_config),
        )
        .await
    };
}

pub(crate) use test_app;

pub fn multipart_body(boundary: &str, field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
