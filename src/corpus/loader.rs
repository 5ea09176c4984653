//! Document loading from the documents directory
//!
//! Individual files that cannot be read or decoded are skipped and reported;
//! they never abort the batch.

use super::extract::{extract_text, FileKind};
use super::CorpusError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A parsed source document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source_uri: String,
    pub text: String,
}

/// A file left out of the corpus, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading a directory
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Result of copying files into the documents directory
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

pub struct DocumentLoader;

impl DocumentLoader {
    /// Recursively load every file under `dir` whose extension is allowed
    pub fn load_dir(dir: &Path, allowed_extensions: &[String]) -> Result<LoadReport, CorpusError> {
        if !dir.is_dir() {
            return Err(CorpusError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
                context: format!("Documents directory unavailable: {}", dir.display()),
            });
        }

        let allowed: Vec<String> = allowed_extensions
            .iter()
            .map(|e| normalize_extension(e))
            .collect();

        let mut report = LoadReport::default();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                    warn!("Skipping unreadable entry {}: {}", path.display(), e);
                    report.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let extension = path
                .extension()
                .map(|e| normalize_extension(&e.to_string_lossy()))
                .unwrap_or_default();
            if !allowed.contains(&extension) {
                debug!("Ignoring {} (extension not allowed)", path.display());
                continue;
            }

            match Self::load_file(path) {
                Ok(document) => report.documents.push(document),
                Err(reason) => {
                    warn!("Skipping {}: {}", path.display(), reason);
                    report.skipped.push(SkippedFile {
                        path: path.to_path_buf(),
                        reason,
                    });
                }
            }
        }

        info!(
            "Loaded {} documents from {} ({} skipped)",
            report.documents.len(),
            dir.display(),
            report.skipped.len()
        );

        Ok(report)
    }

    /// Load a single file, extracting text from PDF and DOCX by extension
    pub fn load_file(path: &Path) -> Result<Document, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("read failed: {}", e))?;
        let extension = path
            .extension()
            .map(|e| normalize_extension(&e.to_string_lossy()))
            .unwrap_or_default();
        let text = extract_text(FileKind::from_extension(&extension), &bytes)
            .map_err(|e| e.to_string())?;

        if text.trim().is_empty() {
            return Err("document is empty".to_string());
        }

        Ok(Document {
            source_uri: path.display().to_string(),
            text,
        })
    }

    /// Copy files into `documents_dir`, never overwriting an existing name
    pub fn import_files(files: &[PathBuf], documents_dir: &Path) -> Result<ImportReport, CorpusError> {
        std::fs::create_dir_all(documents_dir).map_err(|e| CorpusError::Io {
            source: e,
            context: format!(
                "Failed to create documents directory: {}",
                documents_dir.display()
            ),
        })?;

        let mut report = ImportReport::default();

        for file in files {
            let Some(name) = file.file_name() else {
                report.skipped.push(SkippedFile {
                    path: file.clone(),
                    reason: "not a file path".to_string(),
                });
                continue;
            };

            let target = documents_dir.join(name);
            if target.exists() {
                report.skipped.push(SkippedFile {
                    path: file.clone(),
                    reason: format!("{} already exists", target.display()),
                });
                continue;
            }

            match std::fs::copy(file, &target) {
                Ok(_) => report.imported.push(target),
                Err(e) => report.skipped.push(SkippedFile {
                    path: file.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(report)
    }
}

/// ".MD", "md" and ".md" all normalize to ".md"
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    format!(".{}", ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("MD"), ".md");
        assert_eq!(normalize_extension(".txt"), ".txt");
    }

    #[test]
    fn test_load_dir_filters_and_skips() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "The sky is blue.").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("nested/b.MD"), "# Notes\nGrass is green.").unwrap();
        std::fs::write(temp.path().join("c.csv"), "ignored,by,filter").unwrap();
        std::fs::write(temp.path().join("d.pdf"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        std::fs::write(temp.path().join("e.txt"), "   \n").unwrap();

        let report =
            DocumentLoader::load_dir(temp.path(), &exts(&[".txt", "md", ".pdf"])).unwrap();

        assert_eq!(report.documents.len(), 2);
        assert!(report.documents[0].source_uri.ends_with("a.txt"));
        assert_eq!(report.skipped.len(), 2);
        assert!(report
            .skipped
            .iter()
            .any(|s| s.path.ends_with("d.pdf") && s.reason.contains("PDF")));
    }

    #[test]
    fn test_load_missing_dir() {
        let result = DocumentLoader::load_dir(Path::new("/nonexistent/docs"), &exts(&[".txt"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_import_never_overwrites() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let file = source.path().join("notes.txt");
        std::fs::write(&file, "original").unwrap();
        std::fs::write(target.path().join("notes.txt"), "existing").unwrap();

        let report = DocumentLoader::import_files(&[file], target.path()).unwrap();
        assert!(report.imported.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            std::fs::read_to_string(target.path().join("notes.txt")).unwrap(),
            "existing"
        );
    }
}
