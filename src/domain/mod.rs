//! Domain layer for Template Guardian
//!
//! Architecture: Domain Model - Pure types for template completeness checking
//! - Contains findings, reports and the error vocabulary
//! - Independent of file systems, configuration formats and terminals

pub mod findings;

// Re-export main domain types for convenience
pub use findings::*;
