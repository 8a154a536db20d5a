#[macro_use]
extern crate log;

use actix_files::Files;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

use std::io;
use std::sync::Arc;

mod auth;
mod config;
mod db;
mod errors;
mod forms;
mod handlers;
mod model;
mod schema;
mod storage;
mod views;

#[cfg(test)]
mod testing;

use self::config::{Config, TlsConfig};
use self::errors::UserError;
use self::handlers::{accounts, cats, pages, toys};
use self::storage::{HttpObjectStore, ObjectStore, UploadDir};

fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PathConfig::default().error_handler(|_, _| UserError::NotFoundError.into()))
        .route("/", web::get().to(pages::home))
        .route("/about", web::get().to(pages::about))
        .service(pages::status)
        .route("/signup", web::get().to(accounts::signup_form))
        .route("/signup", web::post().to(accounts::signup))
        .route("/login", web::get().to(accounts::login_form))
        .route("/login", web::post().to(accounts::login))
        .route("/logout", web::post().to(accounts::logout))
        .service(
            web::scope("/cats")
                .route("/", web::get().to(cats::cats_index))
                .route("/new", web::get().to(cats::new_cat_form))
                .route("/new", web::post().to(cats::create_cat))
                .route("/{cat_id}/", web::get().to(cats::cat_detail))
                .route("/{cat_id}/edit", web::get().to(cats::edit_cat_form))
                .route("/{cat_id}/edit", web::post().to(cats::update_cat))
                .route("/{cat_id}/delete", web::get().to(cats::confirm_delete_cat))
                .route("/{cat_id}/delete", web::post().to(cats::delete_cat))
                .route("/{cat_id}/add_toy/{toy_id}", web::post().to(cats::assoc_toy))
                .route("/{cat_id}/add_feeding", web::post().to(cats::add_feeding))
                .route("/{cat_id}/add_photo", web::post().to(cats::add_photo)),
        )
        .service(
            web::scope("/toys")
                .route("/", web::get().to(toys::toys_index))
                .route("/new", web::get().to(toys::new_toy_form))
                .route("/new", web::post().to(toys::create_toy))
                .route("/{toy_id}/", web::get().to(toys::toy_detail))
                .route("/{toy_id}/edit", web::get().to(toys::edit_toy_form))
                .route("/{toy_id}/edit", web::post().to(toys::update_toy))
                .route("/{toy_id}/delete", web::get().to(toys::confirm_delete_toy))
                .route("/{toy_id}/delete", web::post().to(toys::delete_toy)),
        );
}

fn ssl_builder(tls: &TlsConfig) -> Result<openssl::ssl::SslAcceptorBuilder, openssl::error::ErrorStack> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
    builder.set_private_key_file(&tls.key_path, SslFiletype::PEM)?;
    builder.set_certificate_chain_file(&tls.cert_path)?;
    Ok(builder)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize env logger
    env_logger::init();

    let config = Config::load();

    // setting up the database connection pool
    let pool = db::setup_database(&config.database_url)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("database setup failed: {}", e)))?;

    let templates = web::Data::new(views::load_templates().map_err(|e| {
        io::Error::new(io::ErrorKind::Other, format!("template loading failed: {}", e))
    })?);

    let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(config.storage.clone()));
    info!(
        "Photos go to bucket {} under {}",
        config.storage.bucket, config.storage.base_url
    );

    std::fs::create_dir_all(&config.upload_tmp_dir)?;
    let upload_tmp_dir = config.upload_tmp_dir.clone();
    let upload_dir = web::Data::new(UploadDir(upload_tmp_dir.clone().into()));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(store.clone()))
            .app_data(templates.clone())
            .app_data(upload_dir.clone())
            .app_data(awmp::PartsConfig::default().with_temp_dir(&upload_tmp_dir))
            .configure(app_config)
            .service(Files::new("/static", "static"))
    });

    let server = match &config.tls {
        Some(tls) => {
            let builder = ssl_builder(tls)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("TLS setup failed: {}", e)))?;
            info!("listening on https://{}", config.bind_addr);
            server.bind_openssl(&config.bind_addr, builder)?
        }
        None => {
            info!("listening on http://{}", config.bind_addr);
            server.bind(&config.bind_addr)?
        }
    };

    server.run().await
}
