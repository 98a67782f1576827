//! Check whether the Bilibili video shown in a browser tab has been preserved
//! on the Internet Archive, and keep the answer current while the tab
//! navigates.

pub mod api;
pub mod browser;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod identifier;
pub mod reconcile;
pub mod sink;
pub mod status;
pub mod video;
pub mod watch;

pub use error::{CheckerError, Result};
