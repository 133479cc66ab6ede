pub mod app;
pub mod composite;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod features;
pub mod fetch;
pub mod fs_util;
pub mod materialize;
pub mod output;
pub mod paginator;
pub mod site;
pub mod store;
