//! HTTP request handlers.

pub mod health;
pub mod objects;
pub mod repository;

pub use health::*;
pub use objects::*;
pub use repository::*;
