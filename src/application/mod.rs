//! Application services layer.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod review;
pub mod store;
