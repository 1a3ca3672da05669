//! Version descriptors for versioned artifact requests.
//!
//! An artifact may be requested at an exact version (`1.2.0`), at a range
//! (`1.2+`, `1.2*`, `1.2*&1.2.4+`), or at any of several ranges separated by
//! whitespace (`1.0 1.2+`).
//!
//! - [`VersionId`] - an exact id, ordered and compared element-wise
//! - [`VersionRange`] - a simple or compound range
//! - [`VersionString`] - the full request, used as part of a resource's identity
//!
//! # Example
//!
//! ```
//! use resource_cache::version::{VersionId, VersionString};
//!
//! let request = VersionString::parse("1.4*&1.4.1_02+").unwrap();
//! assert!(request.contains(&VersionId::parse("1.4.5").unwrap()));
//! assert!(request.exact().is_none());
//! ```

mod error;
mod id;
mod range;

pub use error::VersionError;
pub use id::VersionId;
pub use range::{Modifier, SimpleRange, VersionRange, VersionString};
