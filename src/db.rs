use actix_web::web;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::result::{DatabaseErrorKind, Error::DatabaseError};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use std::error::Error;

use crate::errors::UserError;
use crate::model::*;
use crate::schema::{cats, cats_toys, feedings, photos, sessions, toys, users};

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

pub fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool, Box<dyn Error + Send + Sync>> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);

    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?;

    let mut connection = pool.get()?;
    let conn: &mut SqliteConnection = &mut connection;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    if !applied.is_empty() {
        info!("Applied {} database migration(s)", applied.len());
    }

    Ok(pool)
}

pub fn setup_database(database_url: &str) -> Result<DbPool, Box<dyn Error + Send + Sync>> {
    build_pool(database_url, 8)
}

/// Runs `f` on a pooled connection inside the blocking thread pool.
pub async fn run<F, T>(pool: &DbPool, f: F) -> Result<T, UserError>
where
    F: FnOnce(&mut SqliteConnection) -> QueryResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();

    web::block(move || {
        let mut connection = pool.get().map_err(|_| {
            error!("Failed to get DB connection from pool");
            UserError::DBPoolGetError
        })?;
        f(&mut *connection).map_err(UserError::from)
    })
    .await
    .map_err(|_| {
        error!("Blocking Thread Pool Error");
        UserError::UnexpectedError
    })?
}

// Users and sessions

pub fn create_user(conn: &mut SqliteConnection, new_user: &NewUser) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(new_user)
        .get_result(conn)
}

pub fn find_user_by_username(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(name))
        .first(conn)
        .optional()
}

pub fn create_session(conn: &mut SqliteConnection, session: &Session) -> QueryResult<()> {
    diesel::insert_into(sessions::table)
        .values(session)
        .execute(conn)
        .map(|_| ())
}

/// Sessions started before `not_before` no longer resolve.
pub fn user_for_session(
    conn: &mut SqliteConnection,
    token: &str,
    not_before: NaiveDateTime,
) -> QueryResult<Option<User>> {
    sessions::table
        .inner_join(users::table)
        .filter(sessions::token.eq(token))
        .filter(sessions::created_at.ge(not_before))
        .select(users::all_columns)
        .first(conn)
        .optional()
}

pub fn delete_session(conn: &mut SqliteConnection, token: &str) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::token.eq(token))).execute(conn)
}

pub fn delete_expired_sessions(conn: &mut SqliteConnection, not_before: NaiveDateTime) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::created_at.lt(not_before))).execute(conn)
}

/// Creates an account and its first session together. Returns `None` when
/// the username is already taken; the unique index decides, so concurrent
/// signups for one name cannot both succeed.
pub fn register_user(
    conn: &mut SqliteConnection,
    new_user: &NewUser,
    token: &str,
) -> QueryResult<Option<User>> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let user = match create_user(conn, new_user) {
            Ok(user) => user,
            Err(DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => return Ok(None),
            Err(e) => return Err(e),
        };
        create_session(conn, &Session::starting_now(token, user.id))?;
        Ok(Some(user))
    })
}

// Cats

pub fn cats_for_owner(conn: &mut SqliteConnection, owner_id: i32) -> QueryResult<Vec<Cat>> {
    cats::table
        .filter(cats::user_id.eq(owner_id))
        .order(cats::id.asc())
        .load(conn)
}

/// Looks a cat up by id, scoped to its owner. A cat belonging to someone
/// else is indistinguishable from a missing one.
pub fn find_cat(conn: &mut SqliteConnection, cat_id: i32, owner_id: i32) -> QueryResult<Cat> {
    cats::table
        .filter(cats::id.eq(cat_id))
        .filter(cats::user_id.eq(owner_id))
        .first(conn)
}

pub fn create_cat(conn: &mut SqliteConnection, new_cat: &NewCat) -> QueryResult<Cat> {
    diesel::insert_into(cats::table)
        .values(new_cat)
        .get_result(conn)
}

pub fn update_cat(
    conn: &mut SqliteConnection,
    cat_id: i32,
    owner_id: i32,
    changes: &CatChanges,
) -> QueryResult<Cat> {
    diesel::update(
        cats::table
            .filter(cats::id.eq(cat_id))
            .filter(cats::user_id.eq(owner_id)),
    )
    .set(changes)
    .get_result(conn)
}

/// Deletes a cat with its feedings, photos and toy links in one
/// transaction. Returns false when the owner has no such cat.
pub fn delete_cat(conn: &mut SqliteConnection, cat_id: i32, owner_id: i32) -> QueryResult<bool> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let owned = cats::table
            .filter(cats::id.eq(cat_id))
            .filter(cats::user_id.eq(owner_id))
            .select(cats::id)
            .first::<i32>(conn)
            .optional()?;
        if owned.is_none() {
            return Ok(false);
        }

        diesel::delete(feedings::table.filter(feedings::cat_id.eq(cat_id))).execute(conn)?;
        diesel::delete(photos::table.filter(photos::cat_id.eq(cat_id))).execute(conn)?;
        diesel::delete(cats_toys::table.filter(cats_toys::cat_id.eq(cat_id))).execute(conn)?;
        diesel::delete(cats::table.find(cat_id)).execute(conn)?;
        Ok(true)
    })
}

pub fn cat_toys(conn: &mut SqliteConnection, cat_id: i32) -> QueryResult<Vec<Toy>> {
    toys::table
        .inner_join(cats_toys::table)
        .filter(cats_toys::cat_id.eq(cat_id))
        .select(toys::all_columns)
        .order(toys::name.asc())
        .load(conn)
}

/// Every toy in the catalog minus the ones already linked to `cat_id`.
pub fn toys_not_on_cat(conn: &mut SqliteConnection, cat_id: i32) -> QueryResult<Vec<Toy>> {
    let owned: Vec<i32> = cats_toys::table
        .filter(cats_toys::cat_id.eq(cat_id))
        .select(cats_toys::toy_id)
        .load(conn)?;

    toys::table
        .filter(toys::id.ne_all(owned))
        .order(toys::name.asc())
        .load(conn)
}

/// Links a toy to a cat. Linking the same pair twice leaves one row.
pub fn add_toy_to_cat(conn: &mut SqliteConnection, cat_id: i32, toy_id: i32) -> QueryResult<()> {
    toys::table.find(toy_id).select(toys::id).first::<i32>(conn)?;

    diesel::insert_or_ignore_into(cats_toys::table)
        .values(&CatToy { cat_id, toy_id })
        .execute(conn)
        .map(|_| ())
}

pub fn feedings_for_cat(conn: &mut SqliteConnection, cat_id: i32) -> QueryResult<Vec<Feeding>> {
    feedings::table
        .filter(feedings::cat_id.eq(cat_id))
        .order((feedings::date.desc(), feedings::id.desc()))
        .load(conn)
}

pub fn add_feeding(conn: &mut SqliteConnection, new_feeding: &NewFeeding) -> QueryResult<Feeding> {
    diesel::insert_into(feedings::table)
        .values(new_feeding)
        .get_result(conn)
}

/// A cat counts as fed once it has had as many meals on `today` as there
/// are meal types.
pub fn fed_for_today(conn: &mut SqliteConnection, cat_id: i32, today: NaiveDate) -> QueryResult<bool> {
    let meals: i64 = feedings::table
        .filter(feedings::cat_id.eq(cat_id))
        .filter(feedings::date.eq(today))
        .count()
        .get_result(conn)?;

    Ok(meals >= MealType::ALL.len() as i64)
}

pub fn photos_for_cat(conn: &mut SqliteConnection, cat_id: i32) -> QueryResult<Vec<Photo>> {
    photos::table
        .filter(photos::cat_id.eq(cat_id))
        .order(photos::id.asc())
        .load(conn)
}

pub fn add_photo(conn: &mut SqliteConnection, new_photo: &NewPhoto) -> QueryResult<Photo> {
    diesel::insert_into(photos::table)
        .values(new_photo)
        .get_result(conn)
}

// Toys

pub fn all_toys(conn: &mut SqliteConnection) -> QueryResult<Vec<Toy>> {
    toys::table.order(toys::id.asc()).load(conn)
}

pub fn find_toy(conn: &mut SqliteConnection, toy_id: i32) -> QueryResult<Toy> {
    toys::table.find(toy_id).first(conn)
}

pub fn create_toy(conn: &mut SqliteConnection, new_toy: &NewToy) -> QueryResult<Toy> {
    diesel::insert_into(toys::table)
        .values(new_toy)
        .get_result(conn)
}

pub fn update_toy(conn: &mut SqliteConnection, toy_id: i32, changes: &NewToy) -> QueryResult<Toy> {
    diesel::update(toys::table.find(toy_id))
        .set(changes)
        .get_result(conn)
}

/// Removes a toy from the catalog along with every cat's link to it.
pub fn delete_toy(conn: &mut SqliteConnection, toy_id: i32) -> QueryResult<bool> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(cats_toys::table.filter(cats_toys::toy_id.eq(toy_id))).execute(conn)?;
        let removed = diesel::delete(toys::table.find(toy_id)).execute(conn)?;
        Ok(removed > 0)
    })
}
