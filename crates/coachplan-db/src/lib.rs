//! PostgreSQL persistence for training plans, week schedules and templates.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
