use std::fs;
use std::path::Path;

use crate::config::ReleaseConfig;
use crate::error::{Error, Result};
use crate::git::TagRepository;
use crate::version::{extract_version, parse_semver};

/// Read the release version from the packaging descriptor under `root`.
pub fn read_version(root: &Path, config: &ReleaseConfig) -> Result<String> {
    let path = root.join(&config.descriptor);
    let descriptor = fs::read_to_string(&path)
        .map_err(|e| Error::version(format!("cannot read {}: {}", path.display(), e)))?;

    let version = extract_version(&descriptor).ok_or_else(|| {
        Error::version(format!("no version string found in {}", path.display()))
    })?;

    if parse_semver(&version).is_none() {
        tracing::warn!(%version, "Version is not a semantic version; tagging it as written");
    }
    Ok(version)
}

/// Tag HEAD with the descriptor's version.
///
/// # Returns
/// * `Ok(String)` - The created tag name
/// * `Err` - If the version cannot be read, the tag exists, or git fails
pub fn release<R: TagRepository + ?Sized>(
    root: &Path,
    config: &ReleaseConfig,
    repo: &R,
) -> Result<String> {
    let version = read_version(root, config)?;
    let tag = format!("{}{}", config.tag_prefix, version);

    if repo.find_tag_oid(&tag)?.is_some() {
        return Err(Error::tag(format!("tag '{}' already exists", tag)));
    }

    let head = repo.head_oid()?;
    repo.create_tag(&tag, head)?;
    tracing::info!(%tag, commit = %head, "Created release tag");
    Ok(tag)
}
