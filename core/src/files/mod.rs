pub mod adapter;
pub mod local;
pub mod utils;

use serde::{Deserialize, Serialize};

pub use adapter::ProtocolAdapter;

/// A file or directory entry returned by local and remote listings.
///
/// Field names are serialized as camelCase for the browser UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    /// ISO 8601 timestamp, empty when the server does not report one.
    #[serde(rename = "modifiedDate")]
    pub modified: String,
    /// Unix "rwxrwxrwx" format, `None` when not available.
    pub permissions: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    /// `directory`, the file extension, or `file` when there is none.
    #[serde(rename = "type")]
    pub file_type: String,
}

/// One directory listing together with the directory it was taken from.
///
/// `path` is the directory as resolved by the server, which may differ from
/// the requested path (FTP reports the working directory after `CWD`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirListing {
    pub path: String,
    pub entries: Vec<FileEntry>,
}

/// Drop `.`/`..` and order entries: directories first, then files, each
/// group by name in byte order.
pub fn finalize_listing(mut entries: Vec<FileEntry>) -> Vec<FileEntry> {
    entries.retain(|e| e.name != "." && e.name != "..");
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}

/// Classify an entry for the UI: `directory`, its extension, or `file`.
pub fn entry_type(name: &str, is_directory: bool) -> String {
    if is_directory {
        return "directory".to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_string(),
        _ => "file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_directory: bool) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: format!("/{name}"),
            is_directory,
            size: 0,
            modified: String::new(),
            permissions: None,
            owner: None,
            group: None,
            file_type: entry_type(name, is_directory),
        }
    }

    #[test]
    fn finalize_listing_drops_dot_entries() {
        let entries = finalize_listing(vec![
            entry(".", true),
            entry("..", true),
            entry("docs", true),
            entry(".bashrc", false),
        ]);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["docs", ".bashrc"]);
    }

    #[test]
    fn finalize_listing_sorts_directories_first_case_sensitive() {
        let entries = finalize_listing(vec![
            entry("b.txt", false),
            entry("zeta", true),
            entry("A.txt", false),
            entry("alpha", true),
            entry("Beta", true),
        ]);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        // Uppercase sorts before lowercase in byte order.
        assert_eq!(names, vec!["Beta", "alpha", "zeta", "A.txt", "b.txt"]);
    }

    #[test]
    fn entry_type_uses_extension() {
        assert_eq!(entry_type("photo.jpeg", false), "jpeg");
        assert_eq!(entry_type("archive.tar.gz", false), "gz");
        assert_eq!(entry_type("Makefile", false), "file");
        assert_eq!(entry_type(".profile", false), "file");
        assert_eq!(entry_type("trailing.", false), "file");
        assert_eq!(entry_type("src.d", true), "directory");
    }

    #[test]
    fn file_entry_serializes_ui_keys() {
        let json = serde_json::to_value(entry("notes.md", false)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("isDirectory"));
        assert!(obj.contains_key("modifiedDate"));
        assert_eq!(obj["type"], "md");
        assert!(!obj.contains_key("is_directory"));
    }
}
