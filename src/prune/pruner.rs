use crate::error::PruneError;
use crate::logging;
use crate::prune::archiver::Archiver;
use crate::prune::attributes::local_today;
use crate::prune::category::{Action, Category};
use crate::prune::grouper::{GroupSummary, Grouper};
use crate::prune::paths::POLICY_FILE_NAME;
use crate::prune::policy::RetentionPolicy;
use crate::prune::removal::{RemovalOutcome, remove_files};
use crate::prune::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Options handed to the core by the command-line layer.
#[derive(Debug, Clone)]
pub struct PruneOptions {
    pub verbose: bool,
    pub dry_run: bool,
    pub prompt: bool,
    pub archive: bool,
    pub archive_folder: Option<PathBuf>,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            dry_run: false,
            prompt: true,
            archive: true,
            archive_folder: None,
        }
    }
}

/// Files per category for one run, in policy order with the fallback last.
#[derive(Debug, Clone)]
pub struct Classification {
    entries: Vec<(Category, Vec<String>)>,
    analyzed: usize,
}

impl Classification {
    fn seeded(policy: &RetentionPolicy) -> Self {
        let mut entries = policy
            .categories()
            .iter()
            .map(|category| (category.clone(), Vec::new()))
            .collect::<Vec<_>>();
        entries.push((policy.default_category().clone(), Vec::new()));
        Self {
            entries,
            analyzed: 0,
        }
    }

    fn add(&mut self, position: usize, file: String) {
        self.entries[position].1.push(file);
        self.analyzed += 1;
    }

    pub fn entries(&self) -> &[(Category, Vec<String>)] {
        &self.entries
    }

    pub fn analyzed(&self) -> usize {
        self.analyzed
    }

    #[cfg(test)]
    pub fn files_for(&self, description: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(category, _)| category.description() == description)
            .map(|(_, files)| files.as_slice())
    }

    pub fn non_empty(&self) -> impl Iterator<Item = &(Category, Vec<String>)> {
        self.entries.iter().filter(|(_, files)| !files.is_empty())
    }

    /// True when any category that received files would delete or archive.
    pub fn requires_prompt(&self) -> bool {
        self.non_empty().any(|(category, _)| category.requires_prompt())
    }

    fn needs_archive_destination(&self) -> bool {
        self.non_empty()
            .any(|(category, _)| category.action() == Action::Archive)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    Removed(RemovalOutcome),
    Archived(GroupSummary),
    ArchiveDisabled,
    NothingToDo,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryResult {
    pub category: String,
    pub action: Action,
    pub files: usize,
    pub outcome: ActionOutcome,
    pub message: String,
}

pub struct Pruner {
    options: PruneOptions,
    today: NaiveDate,
}

impl Pruner {
    pub fn new(options: PruneOptions) -> Self {
        Self {
            options,
            today: local_today(),
        }
    }

    #[cfg(test)]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn options(&self) -> &PruneOptions {
        &self.options
    }

    pub fn validate_folder(folder: &Path) -> Result<(), PruneError> {
        if !folder.exists() {
            return Err(PruneError::MissingFolder(folder.to_path_buf()));
        }
        if !folder.is_dir() {
            return Err(PruneError::NotAFolder(folder.to_path_buf()));
        }
        Ok(())
    }

    pub fn load_policy(&self, folder: &Path) -> Result<RetentionPolicy, PruneError> {
        Self::validate_folder(folder)?;
        RetentionPolicy::load(folder, self.today)
    }

    /// Classify every direct entry of the folder, oldest first.
    pub fn analyze(&self, policy: &RetentionPolicy) -> Result<Classification> {
        let folder = policy.folder();
        let mut classification = Classification::seeded(policy);
        let fallback = classification.entries.len() - 1;

        for name in entries_by_mtime(folder)? {
            let category = policy.categorize(&name)?;
            let position = policy
                .categories()
                .iter()
                .position(|c| std::ptr::eq(c, category))
                .unwrap_or(fallback);
            logging::verbose(format!("{name}: {}", category.description()));
            classification.add(position, name);
        }
        Ok(classification)
    }

    fn archiver(&self, folder: &Path) -> Archiver {
        Archiver::new(folder, self.options.archive_folder.clone())
    }

    /// Run each category's action. The archive folder is checked before
    /// anything is deleted.
    pub fn execute(
        &self,
        folder: &Path,
        classification: &Classification,
    ) -> Result<Vec<CategoryResult>> {
        let archiver = self.archiver(folder);
        if self.options.archive && classification.needs_archive_destination() {
            archiver.ensure_destination()?;
        }

        let mut results = Vec::new();
        for (category, files) in classification.entries() {
            let outcome = match category.action() {
                Action::Ignore | Action::Retain => continue,
                Action::Remove if files.is_empty() => ActionOutcome::NothingToDo,
                Action::Remove => {
                    let paths = files.iter().map(|f| folder.join(f)).collect::<Vec<_>>();
                    ActionOutcome::Removed(remove_files(&paths, "remove", ""))
                }
                Action::Archive if !self.options.archive => ActionOutcome::ArchiveDisabled,
                Action::Archive if files.is_empty() => ActionOutcome::NothingToDo,
                Action::Archive => {
                    let mut grouper = Grouper::new(&archiver);
                    grouper.group(folder, files);
                    ActionOutcome::Archived(grouper.archive()?)
                }
            };
            let message = describe(category.action(), &outcome);
            results.push(CategoryResult {
                category: category.description().to_string(),
                action: category.action(),
                files: files.len(),
                outcome,
                message,
            });
        }
        Ok(results)
    }
}

fn describe(action: Action, outcome: &ActionOutcome) -> String {
    match (action, outcome) {
        (_, ActionOutcome::Removed(removal)) => removal.summary(),
        (_, ActionOutcome::Archived(summary)) => summary.text(),
        (_, ActionOutcome::ArchiveDisabled) => {
            "Archive option disabled. Archive(s) not created.".to_string()
        }
        (Action::Archive, ActionOutcome::NothingToDo) => {
            "No files categorized for archival, so no archives created.".to_string()
        }
        (_, ActionOutcome::NothingToDo) => "No files categorized to be removed.".to_string(),
    }
}

fn modified_at(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(UNIX_EPOCH)
}

/// Names of the folder's direct entries, oldest modification first, ties by
/// name. The folder's own policy file is left out, and so is any entry whose
/// name is not valid UTF-8.
pub fn entries_by_mtime(folder: &Path) -> Result<Vec<String>> {
    let read_dir =
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;
    let mut out: Vec<(SystemTime, String)> = Vec::new();
    for entry in read_dir {
        let entry = entry.with_context(|| format!("failed to read {}", folder.display()))?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn::emit(WarnEvent {
                    code: "ENTRY_SKIPPED",
                    stage: "analyze",
                    file: &raw.to_string_lossy(),
                    container: "",
                    reason: "name-not-utf8",
                    err: "",
                });
                continue;
            }
        };
        if name == POLICY_FILE_NAME {
            continue;
        }
        out.push((modified_at(&entry.path()), name));
    }
    out.sort();
    Ok(out.into_iter().map(|(_, name)| name).collect())
}
