use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::assets::DEFAULT_RETENTION;
use crate::commands::CommandReport;
use crate::prune::paths::policy_file_path;
use crate::prune::pruner::Pruner;

fn env_non_empty(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `VISUAL` wins over `EDITOR`; the value may carry arguments
/// (`code --wait`).
fn editor_command(visual: Option<String>, editor: Option<String>) -> Option<(String, Vec<String>)> {
    let raw = visual.or(editor)?;
    let mut parts = raw.split_whitespace().map(ToOwned::to_owned);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

fn create_config(config_file: &Path, report: &mut CommandReport) -> Result<()> {
    fs::write(config_file, DEFAULT_RETENTION)
        .with_context(|| format!("failed to write {}", config_file.display()))?;
    report.detail(format!(
        "Copied default retention policy to {}",
        config_file.display()
    ));
    Ok(())
}

fn edit_config(config_file: &Path, report: &mut CommandReport) -> Result<()> {
    let Some((program, args)) = editor_command(env_non_empty("VISUAL"), env_non_empty("EDITOR"))
    else {
        report.detail(format!(
            "No editor defined in 'VISUAL' or 'EDITOR' variables. Edit {} in your favorite editor.",
            config_file.display()
        ));
        return Ok(());
    };

    let resolved = match which::which(&program) {
        Ok(path) => path,
        Err(err) => {
            report.issue(format!("editor `{program}` not found: {err}"));
            return Ok(());
        }
    };

    report.detail(format!(
        "Editing configuration {} with {program}",
        config_file.display()
    ));
    let status = Command::new(&resolved)
        .args(&args)
        .arg(config_file)
        .status()
        .with_context(|| format!("failed to launch {}", resolved.display()))?;
    if status.success() {
        report.detail("Configuration complete.".to_string());
    } else {
        report.issue("Failed to edit file.".to_string());
    }
    Ok(())
}

/// Edit the folder's `.prune` policy, seeding it from the built-in rules
/// when it does not exist yet.
pub fn run(folder: &Path) -> Result<CommandReport> {
    Pruner::validate_folder(folder)?;
    let config_file = policy_file_path(folder);
    let mut report = CommandReport::new("config");

    if config_file.is_file() {
        if is_writable(&config_file) {
            edit_config(&config_file, &mut report)?;
        } else {
            report.issue(format!(
                "Configuration file {} exists, but is not writeable; cannot edit configuration.",
                config_file.display()
            ));
        }
    } else if config_file.is_dir() {
        report.issue(format!(
            "Configuration file {} exists, but is a directory; cannot create or edit configuration file.",
            config_file.display()
        ));
    } else {
        create_config(&config_file, &mut report)?;
        edit_config(&config_file, &mut report)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn visual_wins_over_editor() {
        assert_eq!(
            editor_command(Some("code --wait".to_string()), Some("vi".to_string())),
            Some(("code".to_string(), vec!["--wait".to_string()]))
        );
        assert_eq!(
            editor_command(None, Some("vi".to_string())),
            Some(("vi".to_string(), Vec::new()))
        );
        assert_eq!(editor_command(None, None), None);
    }

    #[test]
    fn directory_in_place_of_policy_is_reported() {
        let tmp = tempdir().expect("tempdir");
        fs::create_dir(tmp.path().join(".prune")).expect("mkdir");
        let report = run(tmp.path()).expect("run");
        assert!(!report.ok);
        assert!(report.issues[0].contains("is a directory"));
    }

    #[test]
    fn read_only_policy_is_not_edited() {
        let tmp = tempdir().expect("tempdir");
        let policy = tmp.path().join(".prune");
        fs::write(&policy, "# mine\n").expect("write");
        let mut perms = fs::metadata(&policy).expect("metadata").permissions();
        perms.set_readonly(true);
        fs::set_permissions(&policy, perms).expect("chmod");

        let report = run(tmp.path()).expect("run");
        assert!(!report.ok);
        assert!(report.issues[0].contains("not writeable"));
        assert_eq!(fs::read_to_string(&policy).expect("read"), "# mine\n");
    }

    #[test]
    fn seeded_policy_is_the_built_in_one() {
        let tmp = tempdir().expect("tempdir");
        let mut report = CommandReport::new("config");
        let config_file = policy_file_path(tmp.path());
        create_config(&config_file, &mut report).expect("create");
        assert_eq!(
            fs::read_to_string(&config_file).expect("read"),
            DEFAULT_RETENTION
        );
        assert!(report.details[0].starts_with("Copied default retention policy"));
    }
}
