//! Error types for tenantsync-keywords.

use thiserror::Error;

/// All errors that can arise from keyword expansion.
#[derive(Debug, Error)]
pub enum KeywordError {
    /// Placeholders left in the text after every mapping was applied.
    #[error("unresolved keyword placeholders: {}", placeholders.join(", "))]
    Unresolved { placeholders: Vec<String> },
}
