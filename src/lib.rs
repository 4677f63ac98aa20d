pub mod api;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod store;
pub mod timestamp;
