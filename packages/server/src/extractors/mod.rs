pub mod auth;
pub mod json;
pub mod verified_email;
