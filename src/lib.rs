pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod hmmdb;
pub mod output;
pub mod table;
