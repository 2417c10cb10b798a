use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use super::{ComparisonReport, ReportError};

pub const REPORT_SUFFIX: &str = "-comparison.md";
const SLUG_MAX_CHARS: usize = 30;

/// `<slug>-<YYYYmmdd_HHMMSS>-comparison.md`, where the slug keeps
/// alphanumerics, `-` and `_` from the query and turns spaces into dashes.
pub fn report_file_name(query: &str, at: DateTime<Utc>) -> String {
    let kept: String = query
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | '-' | '_'))
        .collect();
    let mut slug: String = kept.trim().replace(' ', "-").chars().take(SLUG_MAX_CHARS).collect();
    if slug.is_empty() {
        slug.push_str("report");
    }
    format!("{slug}-{}{REPORT_SUFFIX}", at.format("%Y%m%d_%H%M%S"))
}

/// Accepts only bare file names produced by [`report_file_name`].
pub fn is_report_file_name(name: &str) -> bool {
    name.ends_with(REPORT_SUFFIX)
        && name.len() > REPORT_SUFFIX.len()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains(['/', '\\'])
}

#[derive(Clone, Debug)]
pub struct ReportWriter {
    directory: PathBuf,
}

impl ReportWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes the report under the reports directory, creating it if needed,
    /// and returns the written path.
    pub fn write(&self, report: &ComparisonReport) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(&report.file_name);
        fs::write(&path, report.markdown.as_bytes())?;
        info!(
            event_name = "report.written",
            query = %report.query,
            path = %path.display(),
            "comparison report written"
        );
        Ok(path)
    }

    /// Path of a previously written report, if `name` is a valid report file
    /// name and the file exists.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        if !is_report_file_name(name) {
            return None;
        }
        let path = self.directory.join(name);
        path.is_file().then_some(path)
    }
}
