pub mod auth;
pub mod error;
pub mod response;
pub mod scheduling;
