//! Per-instance query behaviour.

use woc_profile::VersionFilter;

/// Treatment of keys served from overflow files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnLarge {
    /// Serve overflow keys and list them in `count`/`all_keys`.
    #[default]
    Include,
    /// Act as if overflow files did not exist.
    Ignore,
}

/// Treatment of unknown names and malformed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnBad {
    /// Return an empty result.
    #[default]
    Ignore,
    /// Return a configuration error.
    Error,
}

/// Options of a [`crate::WocMaps`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub on_large: OnLarge,
    /// Versions consulted; only the newest when unset.
    pub version: Option<VersionFilter>,
    pub on_bad: OnBad,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_large(mut self, on_large: OnLarge) -> Self {
        self.on_large = on_large;
        self
    }

    pub fn version(mut self, version: impl Into<VersionFilter>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn on_bad(mut self, on_bad: OnBad) -> Self {
        self.on_bad = on_bad;
        self
    }

    pub(crate) fn include_large(&self) -> bool {
        self.on_large == OnLarge::Include
    }

    pub(crate) fn strict(&self) -> bool {
        self.on_bad == OnBad::Error
    }
}
