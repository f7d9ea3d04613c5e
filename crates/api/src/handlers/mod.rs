pub mod auth;
pub mod calculations;
pub mod users;
