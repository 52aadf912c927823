use crate::prune::warn::{self, WarnEvent};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    pub removed: usize,
    pub failed: usize,
}

impl RemovalOutcome {
    pub fn summary(&self) -> String {
        if self.failed == 0 {
            format!("{} file(s) deleted", self.removed)
        } else {
            format!(
                "{} file(s) deleted, {} could not be deleted",
                self.removed, self.failed
            )
        }
    }
}

/// Delete each path on its own; a failure is counted and warned about,
/// never raised.
pub fn remove_files(paths: &[PathBuf], stage: &str, container: &str) -> RemovalOutcome {
    let mut out = RemovalOutcome::default();
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => out.removed += 1,
            Err(err) => {
                out.failed += 1;
                warn::emit(WarnEvent {
                    code: "REMOVE_FAILED",
                    stage,
                    file: &path.display().to_string(),
                    container,
                    reason: "file-removal-failed",
                    err: &err.to_string(),
                });
            }
        }
    }
    out
}
