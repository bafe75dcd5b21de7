use anyhow::Result;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions recognized as manifest files
const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// File scanner for locating service manifests.
///
/// The `FileScanner` recursively walks a directory to find all manifest files
/// (`.yaml`, `.yml`, `.json`). It skips the `target` directory and hidden
/// directories (those starting with `.`). A root that is itself a file is
/// returned as the only manifest.
///
/// # Example
///
/// ```no_run
/// use interceptor_flow::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./manifests"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} manifests", result.manifest_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of a scan.
pub struct ScanResult {
    /// Discovered manifest files, sorted by path
    pub manifest_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects manifest files.
    ///
    /// Inaccessible entries are logged and recorded as warnings; scanning
    /// continues past them.
    ///
    /// # Errors
    ///
    /// Returns an error if the root path cannot be accessed.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut manifest_files = Vec::new();
        let mut warnings = Vec::new();

        if self.root_path.is_file() {
            return Ok(ScanResult {
                manifest_files: vec![self.root_path.clone()],
                warnings,
            });
        }

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }

                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_target = file_name == "target";

                !is_hidden && !is_target
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_manifest(path) {
                        manifest_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult {
            manifest_files,
            warnings,
        })
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}
