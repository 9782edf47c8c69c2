pub mod bootstrap;
pub mod health;
pub mod mail;
pub mod routes;
pub mod services;
pub mod templates;
