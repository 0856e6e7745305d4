//! Archive services: filter normalization, listing, export and settings.

pub mod archive;
pub mod error;
pub mod export;
pub mod filters;
pub mod listing;
pub mod nonce;
pub mod repos;
pub mod settings;
