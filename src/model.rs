use crate::schema::{cats, cats_toys, feedings, photos, sessions, toys, users};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::{prelude::Insertable, AsChangeset, Queryable};
use serde::Serialize;

use std::fmt;
use std::str::FromStr;

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

#[derive(Queryable, Insertable, Debug)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub token: String,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}

impl Session {
    pub fn starting_now(token: &str, user_id: i32) -> Self {
        Session {
            token: token.to_string(),
            user_id,
            created_at: Utc::now().naive_utc(),
        }
    }
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct Cat {
    pub id: i32,
    pub name: String,
    pub breed: String,
    pub description: String,
    pub age: i32,
    pub user_id: i32,
}

/// A cat as accepted from the create form. The owner is never taken from
/// the request body; handlers fill it in from the authenticated principal.
#[derive(Insertable, Serialize, Debug)]
#[diesel(table_name = cats)]
pub struct NewCat {
    pub name: String,
    pub breed: String,
    pub description: String,
    pub age: i32,
    pub user_id: i32,
}

/// The mutable subset of a cat. Name and owner are fixed at creation.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = cats)]
pub struct CatChanges {
    pub breed: String,
    pub description: String,
    pub age: i32,
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct Toy {
    pub id: i32,
    pub name: String,
    pub color: String,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = toys)]
pub struct NewToy {
    pub name: String,
    pub color: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = cats_toys)]
pub struct CatToy {
    pub cat_id: i32,
    pub toy_id: i32,
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct Feeding {
    pub id: i32,
    pub date: NaiveDate,
    pub meal: String,
    pub cat_id: i32,
}

impl Feeding {
    pub fn meal_label(&self) -> &'static str {
        self.meal
            .parse::<MealType>()
            .map(MealType::label)
            .unwrap_or("Unknown")
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = feedings)]
pub struct NewFeeding {
    pub date: NaiveDate,
    pub meal: String,
    pub cat_id: i32,
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: i32,
    pub url: String,
    pub cat_id: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = photos)]
pub struct NewPhoto {
    pub url: String,
    pub cat_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    /// Single-letter code stored in the `feedings.meal` column.
    pub fn code(self) -> &'static str {
        match self {
            MealType::Breakfast => "B",
            MealType::Lunch => "L",
            MealType::Dinner => "D",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
        }
    }
}

impl FromStr for MealType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(MealType::Breakfast),
            "L" => Ok(MealType::Lunch),
            "D" => Ok(MealType::Dinner),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
