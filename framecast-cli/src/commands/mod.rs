//! CLI command implementations

mod config;
mod info;
mod serve;

pub use config::{ConfigArgs, config};
pub use info::info;
pub use serve::{ServeArgs, serve};
