//! ports - 抽象 trait 层
//!
//! Backend seam between the vault manager and concrete secret stores.

mod secret_backend;

pub use secret_backend::*;
