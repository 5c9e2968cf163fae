use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{GrobidClient, GrobidError};

/// Where a converted TEI document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// A fresh temporary `.xml` file that outlives the process.
    Temp,
    /// `<dir>/<pdf stem>.xml`.
    Directory(PathBuf),
    /// The given path with its extension replaced by `.xml`.
    File(PathBuf),
}

impl OutputTarget {
    /// An existing directory becomes [`OutputTarget::Directory`], anything else a file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            OutputTarget::Directory(path)
        } else {
            OutputTarget::File(path)
        }
    }

    fn resolve(&self, pdf: &Path) -> Option<PathBuf> {
        match self {
            OutputTarget::Temp => None,
            OutputTarget::Directory(dir) => Some(dir.join(format!("{}.xml", stem(pdf)))),
            OutputTarget::File(path) => Some(path.with_extension("xml")),
        }
    }
}

fn stem(pdf: &Path) -> String {
    pdf.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn write_temp(pdf: &Path, body: &[u8]) -> Result<PathBuf, GrobidError> {
    let io_err = |source| GrobidError::Io {
        path: std::env::temp_dir(),
        source,
    };
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{}-", stem(pdf)))
        .suffix(".xml")
        .tempfile()
        .map_err(io_err)?;
    file.write_all(body).map_err(io_err)?;
    let (_, path) = file.keep().map_err(|e| io_err(e.error))?;
    Ok(path)
}

/// Progress notifications from [`GrobidClient::convert_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    Converted {
        index: usize,
        input: PathBuf,
        output: PathBuf,
    },
    Failed {
        index: usize,
        input: PathBuf,
        reason: String,
    },
}

/// Outcome of a batch conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// `(pdf, tei)` pairs.
    pub converted: Vec<(PathBuf, PathBuf)>,
    /// `(input, reason)` pairs.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }
}

/// Every `*.pdf` below `dir`, recursively, in sorted order.
///
/// Symlinked directories are not descended into.
pub fn collect_pdfs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_symlink() && path.is_dir() {
                tracing::debug!(path = %path.display(), "not following symlinked directory");
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

impl GrobidClient {
    /// Convert one PDF and write the TEI according to `target`.
    pub async fn convert_pdf(
        &self,
        pdf: &Path,
        target: &OutputTarget,
    ) -> Result<PathBuf, GrobidError> {
        let body = self.process_pdf(pdf).await?;
        match target.resolve(pdf) {
            Some(path) => {
                tokio::fs::write(&path, &body)
                    .await
                    .map_err(|source| GrobidError::Io {
                        path: path.clone(),
                        source,
                    })?;
                Ok(path)
            }
            None => write_temp(pdf, &body),
        }
    }

    /// Convert every PDF in `inputs` (directories are searched recursively)
    /// into `out_dir`, one at a time.
    ///
    /// Fails only if the server is unreachable or `out_dir` cannot be created.
    /// Individual failures are collected in the report.
    pub async fn convert_batch(
        &self,
        inputs: &[PathBuf],
        out_dir: &Path,
        progress: impl Fn(BatchEvent),
    ) -> Result<BatchReport, GrobidError> {
        self.check_alive().await?;

        let mut report = BatchReport::default();
        let mut pdfs = Vec::new();
        for input in inputs {
            if !input.is_dir() {
                pdfs.push(input.clone());
                continue;
            }
            match collect_pdfs(input) {
                Ok(found) => {
                    if found.is_empty() {
                        tracing::warn!(dir = %input.display(), "no PDF files in directory");
                    }
                    pdfs.extend(found);
                }
                Err(e) => report.failed.push((input.clone(), e.to_string())),
            }
        }

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|source| GrobidError::Io {
                path: out_dir.to_path_buf(),
                source,
            })?;
        let target = OutputTarget::Directory(out_dir.to_path_buf());

        progress(BatchEvent::Started { total: pdfs.len() });
        for (index, pdf) in pdfs.into_iter().enumerate() {
            match self.convert_pdf(&pdf, &target).await {
                Ok(output) => {
                    progress(BatchEvent::Converted {
                        index,
                        input: pdf.clone(),
                        output: output.clone(),
                    });
                    report.converted.push((pdf, output));
                }
                Err(e) => {
                    tracing::warn!(pdf = %pdf.display(), error = %e, "conversion failed");
                    progress(BatchEvent::Failed {
                        index,
                        input: pdf.clone(),
                        reason: e.to_string(),
                    });
                    report.failed.push((pdf, e.to_string()));
                }
            }
        }

        if !report.failed.is_empty() {
            let names: Vec<String> = report
                .failed
                .iter()
                .map(|(p, _)| p.display().to_string())
                .collect();
            tracing::warn!(
                "{} of {} files did not convert: {}",
                report.failed.len(),
                report.total(),
                names.join(", ")
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_target_uses_pdf_stem() {
        let target = OutputTarget::Directory(PathBuf::from("/out"));
        assert_eq!(
            target.resolve(Path::new("/papers/smith2020.pdf")),
            Some(PathBuf::from("/out/smith2020.xml"))
        );
    }

    #[test]
    fn file_target_forces_xml_extension() {
        let target = OutputTarget::File(PathBuf::from("/out/result.tei"));
        assert_eq!(
            target.resolve(Path::new("paper.pdf")),
            Some(PathBuf::from("/out/result.xml"))
        );
        assert_eq!(OutputTarget::Temp.resolve(Path::new("paper.pdf")), None);
    }

    #[test]
    fn from_path_detects_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            OutputTarget::from_path(dir.path()),
            OutputTarget::Directory(dir.path().to_path_buf())
        );
        let file = dir.path().join("out.xml");
        assert_eq!(OutputTarget::from_path(&file), OutputTarget::File(file));
    }

    #[test]
    fn temp_output_is_kept() {
        let path = write_temp(Path::new("paper.pdf"), b"<TEI/>").unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("xml"));
        assert_eq!(std::fs::read(&path).unwrap(), b"<TEI/>");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn collect_pdfs_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(nested.join("a.PDF"), b"%PDF").unwrap();

        let found = collect_pdfs(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("b.pdf"), nested.join("a.PDF")]);
    }

    #[cfg(unix)]
    #[test]
    fn collect_pdfs_does_not_follow_directory_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let found = collect_pdfs(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("a.pdf")]);
    }

    #[cfg(unix)]
    #[test]
    fn collect_pdfs_keeps_symlinked_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.pdf");
        std::fs::write(&target, b"%PDF").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("alias.pdf")).unwrap();

        let found = collect_pdfs(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("alias.pdf"), dir.path().join("real.pdf")]
        );
    }

    #[test]
    fn collect_pdfs_on_missing_dir_fails() {
        assert!(collect_pdfs(Path::new("/definitely/not/here")).is_err());
    }
}
