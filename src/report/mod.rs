//! Backup status report: model, on-disk cache and builder.

mod builder;
mod cache;
mod models;

pub use builder::*;
pub use cache::*;
pub use models::*;
