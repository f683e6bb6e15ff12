//! Terminal reader for NASA's Astronomy Picture of the Day.
//!
//! - [`feed`] - Fetch client: transport, decoding, retry policy
//! - [`app`] - Presentation state fed by fetch results
//! - [`ui`] - ratatui front end
//! - [`config`] - TOML configuration
//! - [`util`] - URL policy and text helpers

pub mod app;
pub mod config;
pub mod feed;
pub mod ui;
pub mod util;
