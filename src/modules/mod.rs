pub mod browser;
pub mod config;
pub mod confirm;
pub mod errors;
pub mod focus;
pub mod http;
pub mod i18n;
pub mod jobs;
pub mod location;
pub mod notify;
pub mod pagination;
pub mod query;
pub mod schema;
pub mod serialize;
pub mod tokens;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
