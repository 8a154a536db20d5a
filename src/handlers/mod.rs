pub mod accounts;
pub mod cats;
pub mod pages;
pub mod toys;

/// Shown above a re-rendered form; no per-field detail is surfaced.
pub const INVALID_FORM: &str = "Invalid input - check the fields and try again";
