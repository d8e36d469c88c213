pub mod aggregate;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod id;
pub mod media;
pub mod middleware;
pub mod models;
pub mod ownership;
pub mod repository;
pub mod response;
pub mod state;
pub mod store;
pub mod toggle;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;
