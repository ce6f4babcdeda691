//! zeptoctl - command-line host with runtime-discovered CLI plugins

pub mod config;
pub mod error;
pub mod plugins;

pub use config::Config;
pub use error::{is_not_found, Result, ZeptoctlError};
