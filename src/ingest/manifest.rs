//! Evidence from an archive already unpacked on disk

use super::{is_license_file, ArtifactSignals};
use std::path::Path;

pub const BUNDLE_LICENSE: &str = "Bundle-License";

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Value of a main-section header in a JAR manifest. Continuation lines
/// (starting with a single space) are joined.
pub fn manifest_header(manifest: &str, name: &str) -> Option<String> {
    let mut current: Option<String> = None;
    let mut found = None;

    for line in manifest.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some(value) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }
        if found.is_none() {
            found = current.take();
        }
        current = None;
        // A blank line ends the main section.
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                current = Some(value.trim_start().to_string());
            }
        }
    }
    found.or(current).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Collect the bundle header and license files of an unpacked archive.
/// Entries are resolved against the directory's `file:` URL.
pub fn scan_extracted(dir: &Path) -> ArtifactSignals {
    let archive_url = url::Url::from_directory_path(dir).ok().map(|u| u.to_string());

    let bundle_header = std::fs::read(dir.join(MANIFEST_PATH))
        .ok()
        .and_then(|bytes| manifest_header(&String::from_utf8_lossy(&bytes), BUNDLE_LICENSE));

    let mut license_files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(dir).ok()?;
            let relative = relative.to_string_lossy().replace('\\', "/");
            is_license_file(&relative).then_some(relative)
        })
        .collect();
    license_files.sort();

    tracing::debug!(
        "Scanned {}: {} license file(s), bundle header {}",
        dir.display(),
        license_files.len(),
        if bundle_header.is_some() { "present" } else { "absent" }
    );

    ArtifactSignals {
        archive_url,
        declared: Vec::new(),
        bundle_header,
        license_files,
    }
}
