use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::LivePulseError;

/// Target identifiers: 1-24 chars of letters, digits, underscores, periods.
static TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]{1,24}$").unwrap());

/// Check one target identifier against the allow-list pattern.
pub fn validate_target(id: &str) -> bool {
    TARGET_RE.is_match(id)
}

/// Load the ordered target list from a file.
///
/// Blank lines and `#` comments are skipped, a leading `@` is stripped,
/// and invalid identifiers are logged and dropped without aborting the
/// load. A missing file gets a commented template written in its place
/// and yields an empty list.
pub fn load_targets(path: &Path) -> Result<Vec<String>, LivePulseError> {
    if !path.exists() {
        warn!(path = %path.display(), "Target file not found, writing template");
        write_template(path)?;
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| LivePulseError::Persistence(format!("reading {}: {e}", path.display())))?;

    let mut targets = Vec::new();
    for (line_num, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = line.trim_start_matches('@').trim();
        if validate_target(id) {
            // Preserve file order, drop repeats
            if !targets.iter().any(|t| t == id) {
                targets.push(id.to_string());
            }
        } else {
            warn!(line = line_num + 1, id, "Invalid target identifier, skipping");
        }
    }

    info!(count = targets.len(), "Loaded target list");
    Ok(targets)
}

fn write_template(path: &Path) -> Result<(), LivePulseError> {
    let template = "\
# Live stream targets
# One identifier per line (leading @ is optional)
# Lines starting with # are comments
#
# example_user_1
# example_user_2
";
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LivePulseError::Persistence(format!("creating {}: {e}", parent.display())))?;
    }
    fs::write(path, template)
        .map_err(|e| LivePulseError::Persistence(format!("writing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_identifiers() {
        assert!(validate_target("user_1"));
        assert!(validate_target("a"));
        assert!(validate_target("some.name_99"));
        assert!(validate_target(&"x".repeat(24)));
    }

    #[test]
    fn rejects_invalid_identifiers() {
        assert!(!validate_target(""));
        assert!(!validate_target(&"x".repeat(25)));
        assert!(!validate_target("has space"));
        assert!(!validate_target("emoji🔥"));
        assert!(!validate_target("dash-ed"));
    }

    #[test]
    fn loads_and_filters_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.txt");
        fs::write(
            &path,
            "# comment\n\n@alice\nbob\nbad name\nalice\n@charlie.c\n",
        )
        .unwrap();

        let targets = load_targets(&path).unwrap();
        assert_eq!(targets, vec!["alice", "bob", "charlie.c"]);
    }

    #[test]
    fn missing_file_writes_template_and_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.txt");

        let targets = load_targets(&path).unwrap();
        assert!(targets.is_empty());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Live stream targets"));
    }
}
