//! # sentinel-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SentinelSettings::default()`]
//! 2. **User file**: `~/.sentinel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SENTINEL_*` overrides (highest priority)

#![deny(unsafe_code)]

/// Error types.
pub mod errors;
/// Layered load: defaults, user file, environment.
pub mod loader;
/// Settings types.
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
