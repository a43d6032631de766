//! Collection of reusable TUI components.

pub mod command_palette;
pub mod detail;
pub mod item_list;
pub mod preview;
