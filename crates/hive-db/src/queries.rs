//! Database query functions organized by table.

pub mod files;
pub mod holdings;
pub mod peers;
