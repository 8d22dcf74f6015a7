//! Personal photo storage: identity, ownership-scoped photo metadata and
//! bucketed file storage, plus a gallery client that drives them.

pub mod access;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
