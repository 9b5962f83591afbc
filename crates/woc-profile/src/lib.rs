//! # woc-profile
//!
//! The registry of an archive: which relation maps and content stores exist,
//! in which versions, and where every shard lives.
//!
//! # Architecture
//!
//! - [`scan`]: walks archive roots and builds a [`Profile`]
//! - [`model`]: the immutable profile and its JSON descriptor
//! - [`grammar`]: filename grammars of shards, overflow files and content stores
//! - [`version`]: version ordering and filters
//! - [`digest`]: sampled file digests
//! - [`verify`]: size and digest checks against a profile
//! - [`discover`]: default descriptor locations
//! - [`preset`]: URL-prefix table and ignored authors

pub mod digest;
pub mod discover;
pub mod error;
pub mod grammar;
pub mod model;
pub mod preset;
pub mod scan;
pub mod verify;
pub mod version;

pub use digest::sample_digest;
pub use discover::{candidates, discover, PROFILE_ENV};
pub use error::{ProfileError, ProfileResult};
pub use grammar::{bit_length, FileName};
pub use model::{ContentStore, Profile, RelationMap, ShardFile, Sharded};
pub use preset::Preset;
pub use scan::{scan, ScanOptions};
pub use verify::{verify, FailureReason, VerifyFailure};
pub use version::{compare_versions, VersionFilter};
