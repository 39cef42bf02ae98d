//! Formatting and path helpers shared by local and remote listings.

use chrono::DateTime;

/// Format seconds since the Unix epoch as an ISO 8601 UTC timestamp.
///
/// Returns an empty string for timestamps chrono cannot represent.
pub fn chrono_from_epoch(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Render the low nine permission bits as `rwxr-xr-x`.
pub fn format_permissions(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|(bit, c)| if mode & bit != 0 { *c } else { '-' })
        .collect()
}

/// Replace Windows path separators so paths render the same everywhere.
pub fn normalize_path_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Join a remote directory and a child name with exactly one `/`.
pub fn join_remote_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Parent of a remote path, `None` for the root.
pub fn remote_parent(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => Some("/".to_string()),
    }
}

/// Last component of a remote path.
pub fn remote_file_name(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    trimmed
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Split an absolute remote path into its cumulative prefixes:
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
pub fn remote_prefixes(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut prefixes = Vec::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(part);
        prefixes.push(current.clone());
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrono_from_epoch_formats_utc() {
        assert_eq!(chrono_from_epoch(0), "1970-01-01T00:00:00Z");
        assert_eq!(chrono_from_epoch(1_700_000_000), "2023-11-14T22:13:20Z");
        assert_eq!(chrono_from_epoch(u64::MAX), "");
    }

    #[test]
    fn format_permissions_common_modes() {
        assert_eq!(format_permissions(0o755), "rwxr-xr-x");
        assert_eq!(format_permissions(0o644), "rw-r--r--");
        assert_eq!(format_permissions(0o100600), "rw-------");
        assert_eq!(format_permissions(0), "---------");
    }

    #[test]
    fn join_remote_path_handles_root_and_trailing_slash() {
        assert_eq!(join_remote_path("/", "up"), "/up");
        assert_eq!(join_remote_path("/home/alice", "x.txt"), "/home/alice/x.txt");
        assert_eq!(join_remote_path("/home/alice/", "x.txt"), "/home/alice/x.txt");
        assert_eq!(join_remote_path("", "x.txt"), "x.txt");
    }

    #[test]
    fn remote_parent_walks_up() {
        assert_eq!(remote_parent("/"), None);
        assert_eq!(remote_parent(""), None);
        assert_eq!(remote_parent("/up").as_deref(), Some("/"));
        assert_eq!(remote_parent("/up/b").as_deref(), Some("/up"));
        assert_eq!(remote_parent("/up/b/").as_deref(), Some("/up"));
        assert_eq!(remote_parent("relative").as_deref(), Some("/"));
    }

    #[test]
    fn remote_file_name_takes_last_component() {
        assert_eq!(remote_file_name("/up/b/y.txt"), "y.txt");
        assert_eq!(remote_file_name("/up/b/"), "b");
        assert_eq!(remote_file_name("plain"), "plain");
    }

    #[test]
    fn remote_prefixes_cumulative() {
        assert_eq!(remote_prefixes("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(remote_prefixes("a//b"), vec!["a", "a/b"]);
        assert!(remote_prefixes("/").is_empty());
    }

    #[test]
    fn normalize_path_separators_replaces_backslashes() {
        assert_eq!(normalize_path_separators(r"C:\Users\me"), "C:/Users/me");
    }
}
