//! File discovery for basin data folders
//!
//! A data folder holds one CSV per basin directly inside it. Subfolders
//! (including earlier output folders) are not searched.

use crate::error::{Result, StreamflowError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File discovery component for basin data folders
#[derive(Debug)]
pub struct FileDiscovery {
    data_folder: PathBuf,
}

impl FileDiscovery {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// All `*.csv` files in the folder, sorted by path
    pub async fn discover_csv_files(&self) -> Result<Vec<PathBuf>> {
        if !self.data_folder.is_dir() {
            return Err(StreamflowError::DatasetNotFound {
                path: self.data_folder.clone(),
            });
        }

        debug!("Searching for CSV files in: {}", self.data_folder.display());

        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.data_folder).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_csv_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        debug!("Found {} basin files", files.len());
        Ok(files)
    }
}

/// Check if a path is a CSV file
fn is_csv_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_discover_csv_files_sorted_and_flat() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.csv"), "TM,INQ\n").unwrap();
        fs::write(root.join("a.csv"), "TM,INQ\n").unwrap();
        fs::write(root.join("notes.txt"), "skip").unwrap();
        fs::create_dir_all(root.join("output").join("a")).unwrap();
        fs::write(root.join("output").join("a").join("a.csv"), "TM,INQ\n").unwrap();

        let discovery = FileDiscovery::new(root.to_path_buf());
        let files = discovery.discover_csv_files().await.unwrap();

        assert_eq!(files, vec![root.join("a.csv"), root.join("b.csv")]);
    }

    #[tokio::test]
    async fn test_missing_folder() {
        let temp_dir = TempDir::new().unwrap();
        let discovery = FileDiscovery::new(temp_dir.path().join("nope"));
        let result = discovery.discover_csv_files().await;
        assert!(matches!(result, Err(StreamflowError::DatasetNotFound { .. })));
    }

    #[test]
    fn test_is_csv_file() {
        assert!(is_csv_file(Path::new("basin.csv")));
        assert!(!is_csv_file(Path::new("basin.CSV.bak")));
        assert!(!is_csv_file(Path::new("basin")));
    }
}
