//! Release version resolution and propagation.
//!
//! The version is settled before anything on disk is touched: an explicit
//! argument wins, otherwise the build descriptor is consulted. Once settled it
//! is written into the localized config so the application shows the number
//! being shipped.

mod localized;
mod resolver;

pub use localized::{LocalizedReport, LocalizedUpdate, replace_version_in_text, sync_localized_config};
pub use resolver::{ReleaseVersion, ResolvedVersion, VersionSource, read_descriptor_version, resolve_version};
