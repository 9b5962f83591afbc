//! # woc-query
//!
//! Lookups over a World of Code archive: a key and a relation or object
//! name in, a decoded value out.
//!
//! # Architecture
//!
//! - [`maps`]: [`WocMaps`], version selection, overflow precedence, key listing
//! - [`router`]: key parsing, shard index and overflow fingerprint
//! - [`content`]: decoded commit, tree, blob and tag objects
//! - [`options`]: overflow, version and bad-input policies
//! - [`error`]: the error taxonomy shared by every query
//!
//! ```no_run
//! use woc_query::{QueryOptions, WocMaps};
//!
//! let woc = WocMaps::open(None, QueryOptions::new())?;
//! let projects = woc.get_values("c2p", "e4af89166a17785c1d741b8b1d5775f3223f510f")?;
//! # Ok::<(), woc_query::WocError>(())
//! ```

pub mod content;
pub mod error;
pub mod key;
pub mod maps;
pub mod options;
pub mod router;

pub use content::{Content, ObjectKind};
pub use error::{ErrorKind, WocError, WocResult};
pub use key::Key;
pub use maps::{AllKeys, ValueIter, WocMaps};
pub use options::{OnBad, OnLarge, QueryOptions};
pub use router::{route, RoutedKey};

pub use woc_codec::Value;
pub use woc_profile::{Profile, VersionFilter};
