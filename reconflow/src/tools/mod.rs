//! External tool inventory.
//!
//! This module provides:
//! - The tool registry consulted during bootstrap
//! - Executable lookup on an explicit search path

mod lookup;
mod registry;

pub use lookup::{extend_search_path, find_executable};
pub use registry::{ToolRegistry, ToolSpec, TOOLS_DIR_PLACEHOLDER};
