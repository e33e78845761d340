//! Debug-symbol bundle descriptions.
//!
//! Discovery of dSYM bundles is an external concern; this crate only
//! consumes already-resolved [`DsymFile`] records mapping debug-ids to
//! locations on disk, plus the output of `dwarfdump --uuid` when a caller
//! wants to verify a bundle matches a crash.

use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use crate::report::uuid_format;

/// A resolved debug-symbol bundle on the local filesystem.
///
/// Equality and hashing are by `path` only; two records pointing at the same
/// bundle are the same dsym regardless of their metadata.
#[derive(Debug, Clone)]
pub struct DsymFile {
    pub name: String,
    pub path: PathBuf,
    /// Path of the DWARF binary inside the bundle, handed to `atos -o`.
    pub binary_path: PathBuf,
    /// Debug-ids this bundle covers, dashed uppercase.
    pub uuids: Vec<String>,
    /// Whether this is the app's own dSYM rather than a framework's.
    pub is_app: bool,
}

impl PartialEq for DsymFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for DsymFile {}

impl Hash for DsymFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl DsymFile {
    /// Whether this bundle covers the given debug-id. Both sides are
    /// canonicalized before comparison.
    pub fn contains_uuid(&self, uuid: &str) -> bool {
        let wanted = uuid_format(uuid);
        self.uuids.iter().any(|u| uuid_format(u) == wanted)
    }
}

/// One `UUID:` line from `dwarfdump --uuid` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwarfUuid {
    pub uuid: String,
    pub arch: Option<String>,
    pub path: Option<String>,
}

/// Parse `dwarfdump --uuid` stdout.
///
/// Lines look like `UUID: E5B0A378-6816-3D90-86FD-2AEF15894A85 (arm64) /path/to/binary`;
/// anything else is skipped.
pub fn parse_dwarfdump_output(stdout: &str) -> Vec<DwarfUuid> {
    stdout
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("UUID: ")?;
            let mut parts = rest.splitn(3, ' ');
            let uuid = parts.next()?.to_string();
            let arch = parts
                .next()
                .map(|a| a.trim_start_matches('(').trim_end_matches(')').to_string());
            let path = parts.next().map(|p| p.trim().to_string());
            Some(DwarfUuid { uuid, arch, path })
        })
        .collect()
}
