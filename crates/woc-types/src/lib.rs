//! Foundation types for World of Code (WoC) archive access.
//!
//! Every other `woc-*` crate depends on `woc-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: 20-byte git SHA-1 identifier of a commit, tree, blob or tag
//! - [`TypeError`]: parse failures for identifiers

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::{ObjectId, OID_HEX_LEN, OID_LEN};
