//! HTML rendering of archive listings.

pub mod views;
