//! Typed input schemas, one per operation.
//!
//! Every field is plain text with a default so that extracting a form never
//! fails on its own; handlers check authentication first and only then call
//! into these types to validate and convert.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::UserError;
use crate::model::{CatChanges, MealType, NewCat, NewFeeding, NewToy};

const MAX_CAT_AGE: i32 = 50;

#[derive(Deserialize, Serialize, Validate, Default, Debug)]
#[serde(default)]
pub struct CatForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub breed: String,
    #[validate(length(max = 250))]
    pub description: String,
    pub age: String,
}

impl CatForm {
    /// Builds the row to insert. `owner_id` comes from the session, never
    /// from the submitted body.
    pub fn to_new_cat(&self, owner_id: i32) -> Result<NewCat, UserError> {
        self.validate()?;
        let age = parse_age(&self.age)?;

        Ok(NewCat {
            name: self.name.trim().to_string(),
            breed: self.breed.trim().to_string(),
            description: self.description.trim().to_string(),
            age,
            user_id: owner_id,
        })
    }
}

#[derive(Deserialize, Serialize, Validate, Default, Debug)]
#[serde(default)]
pub struct CatUpdateForm {
    #[validate(length(min = 1, max = 100))]
    pub breed: String,
    #[validate(length(max = 250))]
    pub description: String,
    pub age: String,
}

impl CatUpdateForm {
    pub fn to_changes(&self) -> Result<CatChanges, UserError> {
        self.validate()?;
        let age = parse_age(&self.age)?;

        Ok(CatChanges {
            breed: self.breed.trim().to_string(),
            description: self.description.trim().to_string(),
            age,
        })
    }
}

fn parse_age(raw: &str) -> Result<i32, UserError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|age| (0..=MAX_CAT_AGE).contains(age))
        .ok_or(UserError::ValidationError)
}

/// Used for both creating and editing toys; the two share a field set.
#[derive(Deserialize, Serialize, Validate, Default, Debug)]
#[serde(default)]
pub struct ToyForm {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub color: String,
}

impl ToyForm {
    pub fn to_new_toy(&self) -> Result<NewToy, UserError> {
        self.validate()?;

        // colour names only, nothing that could carry markup or CSS
        if !self.color.trim().chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
            return Err(UserError::ValidationError);
        }

        Ok(NewToy {
            name: self.name.trim().to_string(),
            color: self.color.trim().to_string(),
        })
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
#[serde(default)]
pub struct FeedingForm {
    pub date: String,
    pub meal: String,
}

impl FeedingForm {
    /// The target cat comes from the URL path, not the form body.
    pub fn to_new_feeding(&self, cat_id: i32) -> Result<NewFeeding, UserError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| UserError::ValidationError)?;
        let meal = self
            .meal
            .trim()
            .parse::<MealType>()
            .map_err(|_| UserError::ValidationError)?;

        Ok(NewFeeding {
            date,
            meal: meal.code().to_string(),
            cat_id,
        })
    }
}

#[derive(Deserialize, Validate, Default, Debug)]
#[serde(default)]
pub struct SignupForm {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password1: String,
    pub password2: String,
}

impl SignupForm {
    /// Returns the cleaned username on success.
    pub fn check(&self) -> Result<String, UserError> {
        self.validate()?;

        let username = self.username.trim();
        let allowed = |c: char| c.is_ascii_alphanumeric() || "@.+-_".contains(c);
        if username.is_empty() || !username.chars().all(allowed) {
            return Err(UserError::ValidationError);
        }
        if self.password1 != self.password2 {
            return Err(UserError::ValidationError);
        }

        Ok(username.to_string())
    }
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}
