//! Client directory layout helpers.
//!
//! The data directory holds one subdirectory per client; each file under a
//! client's directory is a document keyed by its file name.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Lists client ids (subdirectory names) under the data directory, sorted.
/// A missing data directory yields an empty list.
pub fn list_clients(data_dir: &Path) -> Result<Vec<String>> {
    let mut clients = Vec::new();
    if !data_dir.is_dir() {
        return Ok(clients);
    }
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            clients.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    clients.sort();
    Ok(clients)
}

/// Lists document file names in one client's directory, sorted.
pub fn list_files(data_dir: &Path, client_id: &str) -> Result<Vec<String>> {
    let client_dir = client_dir(data_dir, client_id);
    let mut files = Vec::new();
    if !client_dir.is_dir() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(&client_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    files.sort();
    Ok(files)
}

/// Path of one client's document directory.
pub fn client_dir(data_dir: &Path, client_id: &str) -> PathBuf {
    data_dir.join(client_id)
}

/// Whether `client_id` is safe to use as a single path segment under the
/// data directory. Ids key partitions and paths; `..`, separators, and the
/// empty string would escape the data directory.
pub fn valid_client_id(client_id: &str) -> bool {
    !client_id.is_empty()
        && !client_id.contains('/')
        && !client_id.contains('\\')
        && !client_id.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_clients(&missing).unwrap().is_empty());
        assert!(list_files(&missing, "acme").unwrap().is_empty());
    }

    #[test]
    fn clients_are_directories_only_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("acme")).unwrap();
        std::fs::write(dir.path().join("stray.txt"), "x").unwrap();
        assert_eq!(list_clients(dir.path()).unwrap(), vec!["acme", "zeta"]);
    }

    #[test]
    fn traversal_client_ids_are_invalid() {
        assert!(!valid_client_id(".."));
        assert!(!valid_client_id("../other"));
        assert!(!valid_client_id("a/b"));
        assert!(!valid_client_id("a\\b"));
        assert!(!valid_client_id(""));
        assert!(valid_client_id("acme"));
        assert!(valid_client_id("acme-family.trust"));
    }

    #[test]
    fn files_are_regular_files_only_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let acme = dir.path().join("acme");
        std::fs::create_dir(&acme).unwrap();
        std::fs::write(acme.join("b.pdf"), "x").unwrap();
        std::fs::write(acme.join("a.txt"), "x").unwrap();
        std::fs::create_dir(acme.join("subdir")).unwrap();
        assert_eq!(
            list_files(dir.path(), "acme").unwrap(),
            vec!["a.txt", "b.pdf"]
        );
    }
}
