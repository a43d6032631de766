//! Infrastructure adapters for config, logging, clipboard, and highlighting.

pub mod clipboard;
pub mod config;
pub mod highlight;
pub mod logging;
