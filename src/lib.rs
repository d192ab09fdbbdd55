pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod i18n;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod storage;
pub mod types;

pub use context::AppContext;
pub use routes::app;
