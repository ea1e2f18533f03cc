//! Presentation layer: askama views.

pub mod views;
