use crate::error::PruneError;
use crate::prune::archiver::{ArchiveOutcome, Archiver};
use crate::prune::warn::{self, WarnEvent};
use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Receives one month bucket at a time.
pub trait ArchiveSink {
    fn archive(&self, bucket: &str, files: &[String]) -> Result<ArchiveOutcome>;
}

impl ArchiveSink for Archiver {
    fn archive(&self, bucket: &str, files: &[String]) -> Result<ArchiveOutcome> {
        Archiver::archive(self, bucket, files)
    }
}

/// `Mar-2008` style label for the month a file was last modified in.
pub fn bucket_label(modified: DateTime<Local>) -> String {
    modified.format("%b-%Y").to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketFailure {
    pub bucket: String,
    pub files: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupSummary {
    pub archived: Vec<ArchiveOutcome>,
    pub failures: Vec<BucketFailure>,
    /// Files whose modification time could not be read; left in place.
    pub ungrouped: Vec<String>,
}

impl GroupSummary {
    pub fn unremoved(&self) -> usize {
        self.archived.iter().map(|a| a.removal.failed).sum()
    }

    pub fn text(&self) -> String {
        let sizes = self
            .archived
            .iter()
            .map(|a| a.added.to_string())
            .collect::<Vec<_>>();
        let mut out = if sizes.is_empty() {
            "0 archive(s) created".to_string()
        } else {
            format!(
                "{} archive(s) created ({} file(s), respectively)",
                sizes.len(),
                sizes.join(", ")
            )
        };
        if !self.failures.is_empty() {
            let labels = self
                .failures
                .iter()
                .map(|f| f.bucket.as_str())
                .collect::<Vec<_>>();
            out.push_str(&format!(
                "; {} archive(s) failed ({})",
                self.failures.len(),
                labels.join(", ")
            ));
        }
        if !self.ungrouped.is_empty() {
            out.push_str(&format!(
                "; {} file(s) could not be grouped",
                self.ungrouped.len()
            ));
        }
        let unremoved = self.unremoved();
        if unremoved > 0 {
            out.push_str(&format!(
                "; {unremoved} archived file(s) could not be deleted"
            ));
        }
        out
    }
}

/// Splits the files headed for archival into month buckets, kept in the
/// order buckets were first seen.
pub struct Grouper<'a, S: ArchiveSink + ?Sized> {
    sink: &'a S,
    groups: Vec<(String, Vec<String>)>,
    ungrouped: Vec<String>,
}

impl<'a, S: ArchiveSink + ?Sized> Grouper<'a, S> {
    pub fn new(sink: &'a S) -> Self {
        Self {
            sink,
            groups: Vec::new(),
            ungrouped: Vec::new(),
        }
    }

    /// Files whose modification time cannot be read are set aside and
    /// reported by `archive()`; they never stop the other files.
    pub fn group(&mut self, folder: &Path, files: &[String]) -> &mut Self {
        for file in files {
            let path = folder.join(file);
            let modified: DateTime<Local> =
                match fs::metadata(&path).and_then(|meta| meta.modified()) {
                    Ok(time) => time.into(),
                    Err(err) => {
                        warn::emit(WarnEvent {
                            code: "GROUP_FAILED",
                            stage: "group",
                            file: file.as_str(),
                            container: "",
                            reason: "mtime-unreadable",
                            err: &err.to_string(),
                        });
                        self.ungrouped.push(file.clone());
                        continue;
                    }
                };
            let label = bucket_label(modified);
            match self.groups.iter_mut().find(|(name, _)| *name == label) {
                Some((_, members)) => members.push(file.clone()),
                None => self.groups.push((label, vec![file.clone()])),
            }
        }
        self
    }

    #[cfg(test)]
    pub fn groups(&self) -> &[(String, Vec<String>)] {
        &self.groups
    }

    /// Archive every bucket. A failing bucket is recorded and the rest still
    /// run; an unusable destination stops everything.
    pub fn archive(&self) -> Result<GroupSummary> {
        let mut summary = GroupSummary {
            ungrouped: self.ungrouped.clone(),
            ..GroupSummary::default()
        };
        for (bucket, files) in &self.groups {
            match self.sink.archive(bucket, files) {
                Ok(outcome) => summary.archived.push(outcome),
                Err(err)
                    if matches!(
                        err.downcast_ref::<PruneError>(),
                        Some(PruneError::Destination { .. })
                    ) =>
                {
                    return Err(err);
                }
                Err(err) => {
                    warn::emit(WarnEvent {
                        code: "ARCHIVE_FAILED",
                        stage: "archive",
                        file: &files.join(","),
                        container: bucket,
                        reason: "container-write-failed",
                        err: &format!("{err:#}"),
                    });
                    summary.failures.push(BucketFailure {
                        bucket: bucket.clone(),
                        files: files.len(),
                        error: format!("{err:#}"),
                    });
                }
            }
        }
        Ok(summary)
    }
}
