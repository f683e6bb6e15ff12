//! Terminal User Interface module.
//!
//! Draws the [`FeedView`](crate::app::FeedView) held by [`App`](crate::app::App):
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `render` - Layout dispatch
//! - `cards` - Card list widget
//! - `status` - Status bar and error banner

mod cards;
mod input;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::run;
