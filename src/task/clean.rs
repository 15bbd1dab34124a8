use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::config::Config;

/// Paths under `root` the clean target would remove, in configured order.
///
/// Entries naming the root itself, an absolute path or a path outside the
/// root are skipped with a warning.
pub fn clean_targets(root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut targets = Vec::new();
    for pattern in &config.clean.paths {
        let pattern = config.expand(pattern);
        match pattern.strip_prefix('*') {
            Some(suffix) if !suffix.is_empty() => {
                targets.extend(matching_entries(root, suffix))
            }
            _ if is_inside_root(Path::new(&pattern)) => targets.push(root.join(&pattern)),
            _ => tracing::warn!(path = %pattern, "Refusing to clean a path outside the project"),
        }
    }
    targets
}

/// True when `relative` names an entry strictly below the root.
fn is_inside_root(relative: &Path) -> bool {
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

fn matching_entries(root: &Path, suffix: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut matches: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches
}

/// Remove every clean target. Best-effort: missing paths are skipped and
/// failures are logged, never returned.
///
/// # Returns
/// The paths that were actually removed.
pub fn clean(root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for path in clean_targets(root, config) {
        let result = match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed");
                removed.push(path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_targets_expand_env_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("minidb.egg-info")).unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();

        let targets = clean_targets(dir.path(), &Config::default());
        assert_eq!(
            targets,
            vec![
                dir.path().join("build"),
                dir.path().join("dist"),
                dir.path().join("env"),
                dir.path().join("minidb.egg-info"),
            ]
        );
    }

    #[test]
    fn test_clean_removes_dirs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build/lib")).unwrap();
        fs::write(dir.path().join("build/lib/minidb.py"), "x").unwrap();
        fs::write(dir.path().join("dist"), "not a dir").unwrap();
        fs::write(dir.path().join("setup.py"), "keep").unwrap();

        let removed = clean(dir.path(), &Config::default());

        assert_eq!(removed.len(), 2);
        assert!(!dir.path().join("build").exists());
        assert!(!dir.path().join("dist").exists());
        assert!(dir.path().join("setup.py").exists());
    }

    #[test]
    fn test_env_dir_naming_the_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("setup.py"), "keep").unwrap();

        for env_dir in ["", ".", "./", "build/..", "../elsewhere", "/tmp"] {
            let mut config = Config::default();
            config.environment.dir = env_dir.to_string();
            let targets = clean_targets(dir.path(), &config);
            assert_eq!(
                targets,
                vec![dir.path().join("build"), dir.path().join("dist")],
                "env dir {:?}",
                env_dir
            );
        }

        let mut config = Config::default();
        config.environment.dir = String::new();
        let removed = clean(dir.path(), &config);

        assert_eq!(removed, vec![dir.path().join("build")]);
        assert!(dir.path().join("setup.py").exists());
    }

    #[test]
    fn test_nested_env_dir_is_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.environment.dir = ".cache/../venv".to_string();
        let targets = clean_targets(dir.path(), &config);
        assert!(targets.contains(&dir.path().join(".cache/../venv")));
    }

    #[test]
    fn test_clean_on_empty_tree_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(clean(dir.path(), &Config::default()).is_empty());
        assert!(clean(dir.path(), &Config::default()).is_empty());
    }
}
