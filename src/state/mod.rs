/// State management module
///
/// This module handles the persistent side of the gallery:
/// - Database connections and queries (library.rs)
/// - Shared data structures (data.rs)

pub mod data;
pub mod library;
