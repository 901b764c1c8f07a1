#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod card;
pub mod config;
pub mod csv;
pub mod debug;
pub mod feed;
pub mod item;
pub mod lazy;
pub mod media;
pub mod modal;
pub mod preview;
pub mod resolve;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
