use chrono::{Datelike, Duration, Local, NaiveDate, TimeZone, Weekday};
use flate2::read::GzDecoder;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tempfile::tempdir;

fn days_ago(days: i64) -> NaiveDate {
    Local::now().date_naive() - Duration::days(days)
}

fn on_or_before(mut date: NaiveDate, friday: bool) -> NaiveDate {
    while (date.weekday() == Weekday::Fri) != friday {
        date -= Duration::days(1);
    }
    date
}

fn touch(dir: &Path, name: &str, date: NaiveDate) {
    let path = dir.join(name);
    fs::write(&path, format!("{name}\n")).expect("write file");
    let mtime: SystemTime = Local
        .with_ymd_and_hms(date.year(), date.month(), date.day(), 12, 0, 0)
        .single()
        .expect("local time")
        .into();
    fs::File::options()
        .write(true)
        .open(&path)
        .expect("open file")
        .set_modified(mtime)
        .expect("set mtime");
}

fn container_entries(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).expect("open container");
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .entries()
        .expect("entries")
        .map(|entry| {
            entry
                .expect("entry")
                .path()
                .expect("path")
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn prune_cmd(tmp: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("prune");
    cmd.current_dir(tmp)
        .env("PRUNE_CONFIG_PATH", tmp.join("no-config.toml"))
        .env_remove("PRUNE_ARCHIVE_FOLDER")
        .env_remove("PRUNE_PROMPT")
        .env_remove("PRUNE_VERBOSE")
        .env_remove("PRUNE_ARCHIVE_ENABLED");
    cmd
}

#[test]
fn no_arguments_prints_usage() {
    let tmp = tempdir().expect("tempdir");
    prune_cmd(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: prune [options] <FOLDER>"));
}

#[test]
fn missing_folder_is_an_error() {
    let tmp = tempdir().expect("tempdir");
    prune_cmd(tmp.path())
        .arg(tmp.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot find folder"));
}

#[test]
fn dry_run_lists_categories_without_touching_files() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("mysql");
    fs::create_dir(&source).expect("mkdir source");
    touch(&source, "stale.sql", on_or_before(days_ago(40), false));
    touch(&source, "fresh.sql", days_ago(1));

    prune_cmd(tmp.path())
        .arg("--dry-run")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Removing 'Non-Friday' files Older than Two Weeks:\n\t\tstale.sql",
        ))
        .stdout(predicate::str::contains("2 file(s) analyzed"));

    assert!(source.join("stale.sql").exists());
    assert!(source.join("fresh.sql").exists());
}

#[test]
fn forced_run_removes_and_archives() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("mysql");
    fs::create_dir(&source).expect("mkdir source");
    let archived_day = on_or_before(days_ago(120), true);
    touch(&source, "old-friday.sql", archived_day);
    touch(&source, "stale.sql", on_or_before(days_ago(40), false));
    touch(&source, "fresh.sql", days_ago(1));

    prune_cmd(tmp.path())
        .arg("--force")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 file(s) deleted"))
        .stdout(predicate::str::contains(
            "1 archive(s) created (1 file(s), respectively)",
        ));

    let label = Local
        .with_ymd_and_hms(
            archived_day.year(),
            archived_day.month(),
            archived_day.day(),
            12,
            0,
            0,
        )
        .single()
        .expect("local time")
        .format("%b-%Y")
        .to_string();
    let container = tmp
        .path()
        .join("mysql-archives")
        .join(format!("archive-{label}.tar.gz"));
    assert_eq!(container_entries(&container), vec!["old-friday.sql"]);
    assert!(!source.join("old-friday.sql").exists());
    assert!(!source.join("stale.sql").exists());
    assert!(source.join("fresh.sql").exists());
}

#[test]
fn declined_prompt_keeps_everything() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("dumps");
    fs::create_dir(&source).expect("mkdir source");
    touch(&source, "stale.sql", on_or_before(days_ago(40), false));

    prune_cmd(tmp.path())
        .arg(&source)
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Proceed? [y/N]: "))
        .stdout(predicate::str::contains("Not proceeding; no actions taken."));

    assert!(source.join("stale.sql").exists());
}

#[test]
fn archive_folder_from_environment_is_used() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("dumps");
    fs::create_dir(&source).expect("mkdir source");
    touch(&source, "old-friday.sql", on_or_before(days_ago(120), true));
    let destination = tmp.path().join("vault");

    prune_cmd(tmp.path())
        .env("PRUNE_ARCHIVE_FOLDER", &destination)
        .arg("-f")
        .arg(&source)
        .assert()
        .success();

    let containers = fs::read_dir(&destination)
        .expect("read vault")
        .filter_map(Result::ok)
        .count();
    assert_eq!(containers, 1);
    assert!(!tmp.path().join("dumps-archives").exists());
}

#[test]
fn uncreatable_archive_folder_stops_the_run() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("dumps");
    fs::create_dir(&source).expect("mkdir source");
    touch(&source, "old-friday.sql", on_or_before(days_ago(120), true));
    touch(&source, "stale.sql", on_or_before(days_ago(40), false));
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "not a folder").expect("write blocker");

    prune_cmd(tmp.path())
        .args(["--force", "--archive-folder"])
        .arg(blocker.join("archives"))
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist and cannot be created"));

    assert!(source.join("old-friday.sql").exists());
    assert!(source.join("stale.sql").exists());
}

#[test]
fn folder_policy_overrides_defaults() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("logs");
    fs::create_dir(&source).expect("mkdir source");
    fs::write(
        source.join(".prune"),
        r#"
[[category]]
description = "Dropping logs"
action = "remove"
when = [{ field = "extension", op = "eq", value = "log" }]
"#,
    )
    .expect("write policy");
    touch(&source, "app.log", days_ago(1));
    touch(&source, "notes.txt", days_ago(400));

    prune_cmd(tmp.path())
        .args(["--force", "--json"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"command\": \"prune\""))
        .stdout(predicate::str::contains("1 file(s) deleted"));

    assert!(!source.join("app.log").exists());
    assert!(source.join("notes.txt").exists());
    assert!(source.join(".prune").exists());
}

#[test]
fn broken_policy_aborts_before_any_action() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("logs");
    fs::create_dir(&source).expect("mkdir source");
    fs::write(
        source.join(".prune"),
        "[[category]]\ndescription = \"No action\"\nwhen = []\n",
    )
    .expect("write policy");
    touch(&source, "app.log", days_ago(400));

    prune_cmd(tmp.path())
        .arg("--force")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No action has no action defined"));

    assert!(source.join("app.log").exists());
}

#[test]
fn json_report_stays_parseable_with_prompt_and_verbose() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("dumps");
    fs::create_dir(&source).expect("mkdir source");
    touch(&source, "stale.sql", on_or_before(days_ago(40), false));
    touch(&source, "old-friday.sql", on_or_before(days_ago(120), true));

    let output = prune_cmd(tmp.path())
        .args(["--json", "--verbose"])
        .arg(&source)
        .write_stdin("y\n")
        .output()
        .expect("run prune");

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is a single JSON document");
    assert_eq!(report["command"], "prune");
    assert_eq!(report["ok"], true);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Proceed? [y/N]: "));
    assert!(stderr.contains("Analyzing '"));
    assert!(!source.join("stale.sql").exists());
}
