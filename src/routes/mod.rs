pub mod auth;
mod health_check;
pub mod reservas;

pub use health_check::health_check;
