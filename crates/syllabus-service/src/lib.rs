#[macro_use]
pub mod metrics;

pub mod caching;
pub mod catalog;
pub mod config;
pub mod content;
pub mod logging;
pub mod service;
pub mod sources;

pub use service::ContentService;
