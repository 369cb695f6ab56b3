//! Render submission log, flag marker, and startup bootstrap

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::AdminConfig;
use crate::error::Result;

pub const STAGE_FLAG: &str = "FLAG{non_root_rce_obtained}";

const SUBMISSIONS_LOG: &str = "render_submissions.log";
const FLAG_MARKER: &str = "fake_flag_retrieved.txt";

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

/// First `limit` characters, newlines escaped so each submission stays on one line
pub fn log_excerpt(template: &str, limit: usize) -> String {
    template
        .chars()
        .take(limit)
        .collect::<String>()
        .replace('\n', "\\n")
}

#[derive(Debug, Clone)]
pub struct SubmissionLog {
    log_path: PathBuf,
    marker_path: PathBuf,
    truncate: usize,
}

impl SubmissionLog {
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            log_path: config.log_dir.join(SUBMISSIONS_LOG),
            marker_path: config.status_dir.join(FLAG_MARKER),
            truncate: config.log_truncate,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Append one submission; failures are logged and swallowed
    pub async fn record(&self, remote: &str, template: &str, json: bool) {
        let label = if json { "Submission (json)" } else { "Submission" };
        let line = format!(
            "{} {} from {}: {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            label,
            remote,
            log_excerpt(template, self.truncate)
        );
        if let Err(e) = append_line(&self.log_path, &line).await {
            tracing::warn!(
                "failed to write submission log {}: {}",
                self.log_path.display(),
                e
            );
        }
    }

    /// Note that `remote` got the stage flag out through the renderer
    pub async fn mark_flag(&self, remote: &str) {
        let line = format!(
            "{} {}\n",
            remote,
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f")
        );
        tracing::info!("stage flag observed in render output for {}", remote);
        if let Err(e) = append_line(&self.marker_path, &line).await {
            tracing::warn!(
                "failed to write flag marker {}: {}",
                self.marker_path.display(),
                e
            );
        }
    }
}

/// Create working directories and seed the flag file when configured
pub async fn bootstrap(config: &AdminConfig) -> Result<()> {
    for dir in [
        &config.templates_dir,
        &config.pages_dir,
        &config.log_dir,
        &config.status_dir,
    ] {
        tokio::fs::create_dir_all(dir).await?;
    }

    if let Some(flag_file) = &config.flag_file
        && !tokio::fs::try_exists(flag_file).await.unwrap_or(false)
    {
        let seeded = async {
            if let Some(parent) = flag_file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(flag_file, format!("{STAGE_FLAG}\n")).await
        }
        .await;
        match seeded {
            Ok(()) => tracing::info!("seeded flag file {}", flag_file.display()),
            Err(e) => tracing::warn!("could not seed flag file {}: {}", flag_file.display(), e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> AdminConfig {
        AdminConfig {
            templates_dir: dir.join("templates"),
            pages_dir: dir.join("pages"),
            log_dir: dir.join("log"),
            status_dir: dir.join("status"),
            flag_file: Some(dir.join("home/monkey/flag.txt")),
            log_truncate: 8,
            ..AdminConfig::default()
        }
    }

    #[test]
    fn excerpt_truncates_then_escapes() {
        assert_eq!(log_excerpt("ab\ncd\nef", 4), "ab\\nc");
        assert_eq!(log_excerpt("héllo", 2), "hé");
    }

    #[tokio::test]
    async fn bootstrap_creates_dirs_and_seeds_flag_once() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        bootstrap(&config).await.unwrap();
        assert!(config.log_dir.is_dir());
        assert!(config.status_dir.is_dir());
        let flag = config.flag_file.clone().unwrap();
        assert_eq!(std::fs::read_to_string(&flag).unwrap(), "FLAG{non_root_rce_obtained}\n");

        std::fs::write(&flag, "custom\n").unwrap();
        bootstrap(&config).await.unwrap();
        assert_eq!(std::fs::read_to_string(&flag).unwrap(), "custom\n");
    }

    #[tokio::test]
    async fn records_append() {
        let tmp = tempfile::tempdir().unwrap();
        let log = SubmissionLog::new(&config_in(tmp.path()));
        log.record("10.0.0.7", "{{username}}\nmore text", false).await;
        log.record("10.0.0.8", "x", true).await;
        let content = std::fs::read_to_string(log.log_path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Submission from 10.0.0.7: {{userna"));
        assert!(lines[1].ends_with("Submission (json) from 10.0.0.8: x"));

        log.mark_flag("10.0.0.7").await;
        let marker = std::fs::read_to_string(log.marker_path()).unwrap();
        assert!(marker.starts_with("10.0.0.7 "));
    }
}
