//! # tenantsync-keywords
//!
//! Keyword placeholders in desired-state documents.
//!
//! Two marker forms are recognised:
//! - `##KEY##`: replaced by the plain-text form of the value
//! - `@@KEY@@`: replaced by the JSON form; a surrounding pair of quotes is
//!   consumed so lists and numbers land as structured values
//!
//! [`template`] expands documents before they are parsed; [`preserve`] runs
//! the other way on export, pinning remote values back to their placeholders.
//!
//! ```rust
//! use tenantsync_core::KeywordMapping;
//! use tenantsync_keywords::keyword_replace;
//!
//! let mut mapping = KeywordMapping::new();
//! mapping.insert("ENV".into(), "prod".into());
//! assert_eq!(keyword_replace(r###"{"a":"##ENV##"}"###, &mapping), r#"{"a":"prod"}"#);
//! ```

pub mod error;
pub mod preserve;
pub mod template;

pub use error::KeywordError;
pub use preserve::{
    preservable_fields, preserve_keywords, should_field_be_preserved, AddressSegment,
    FieldAddress, Preserved,
};
pub use template::{expand, keyword_replace, unresolved_placeholders};
