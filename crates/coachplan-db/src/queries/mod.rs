//! Query functions, one module per table group.

pub mod blocks;
pub mod days;
pub mod exercises;
pub mod plans;
pub mod templates;
