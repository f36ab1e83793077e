//! Command implementations

pub mod data;
pub mod health;
pub mod inspect;
pub mod predict;
pub mod train;
