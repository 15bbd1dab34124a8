use regex::Regex;
use std::sync::OnceLock;

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| {
        Regex::new(r#"(?m)\bversion\s*=\s*['"]([^'"]+)['"]"#).expect("valid regex")
    })
}

/// Extracts the version string from a packaging descriptor.
///
/// Matches the first `version = '...'` (or double-quoted) assignment, which
/// covers both `setup(version='2.0.1', ...)` and a `Cargo.toml` package table.
///
/// # Arguments
/// * `descriptor` - Full text of the descriptor file
///
/// # Returns
/// * `Some(String)` - The version, exactly as written
/// * `None` - If no assignment is found
///
/// # Example
/// ```ignore
/// assert_eq!(extract_version("version='2.0.1',").unwrap(), "2.0.1");
/// assert_eq!(extract_version("name = 'minidb'"), None);
/// ```
pub fn extract_version(descriptor: &str) -> Option<String> {
    version_regex()
        .captures(descriptor)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a version as semantic version, if it is one.
pub fn parse_semver(version: &str) -> Option<semver::Version> {
    semver::Version::parse(version).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_setup_py() {
        let descriptor = r#"
setup(
    name='minidb',
    version='2.0.1',
    url='https://example.invalid/minidb',
)
"#;
        assert_eq!(extract_version(descriptor).as_deref(), Some("2.0.1"));
    }

    #[test]
    fn test_extract_with_spaces_and_double_quotes() {
        assert_eq!(
            extract_version("[package]\nname = \"minidb\"\nversion = \"0.3.0\"\n").as_deref(),
            Some("0.3.0")
        );
        assert_eq!(
            extract_version("version = '1.2.3'").as_deref(),
            Some("1.2.3")
        );
    }

    #[test]
    fn test_extract_ignores_similar_names() {
        assert_eq!(
            extract_version("python_version='3.8'\nversion='1.0.0'").as_deref(),
            Some("1.0.0")
        );
    }

    #[test]
    fn test_extract_missing_version() {
        assert_eq!(extract_version("name = 'minidb'"), None);
        assert_eq!(extract_version("version = ''"), None);
    }

    #[test]
    fn test_parse_semver() {
        let version = parse_semver("2.0.1").unwrap();
        assert_eq!((version.major, version.minor, version.patch), (2, 0, 1));
        assert!(parse_semver("2.0").is_none());
    }
}
