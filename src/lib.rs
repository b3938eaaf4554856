pub mod config;
pub mod database;
pub mod errors;
pub mod favicon;
pub mod models;
pub mod repositories;
pub mod web;
