#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
pub mod core;

pub mod app;
pub use app::{run, RunOptions};
pub use core::error::{Error, Result};
