//! Application layer: parsing, editing, and exporting tailoring documents.

pub mod edit;
pub mod export;
pub mod parse;
pub mod preview;
pub mod session;
