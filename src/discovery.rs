// Source Discovery - candidate workbooks in the source directory
//
// A path is a candidate iff: the extension matches, the file name contains
// the source marker, it is not an editor lock file, and it is not the
// registry workbook itself. The result is sorted lexicographically by file
// name so two runs over an unchanged directory see the same order.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::EngineConfig;

/// Enumerate candidate source workbooks in `dir`, excluding the registry
/// workbook, in stable lexicographic order.
pub fn discover_workbooks(
    dir: &Path,
    registry_path: &Path,
    config: &EngineConfig,
) -> std::io::Result<Vec<PathBuf>> {
    let registry_name = registry_path.file_name().map(|n| n.to_owned());
    let mut candidates = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("unreadable directory entry: {err}");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        let extension_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&config.extension))
            .unwrap_or(false);
        if !extension_ok {
            continue;
        }
        if !name.contains(&config.source_marker) {
            continue;
        }
        if name.starts_with(&config.lock_prefix) {
            continue;
        }
        if registry_name.as_deref() == path.file_name() {
            continue;
        }

        candidates.push(path);
    }

    candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(candidates)
}

/// Employee identity for a source workbook: the file stem.
pub fn employee_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
