pub mod app;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod error;
pub mod models;
pub mod overlay;
pub mod render;
pub mod sentinel;
pub mod tmdb;
pub mod votes;
