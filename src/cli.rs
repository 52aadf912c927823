use anyhow::{Result, bail};
use clap::{ArgAction, CommandFactory, Parser};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::config::load_config;
use crate::logging;
use crate::prune::pruner::{PruneOptions, Pruner};

#[derive(Debug, Parser)]
#[command(
    name = "prune",
    version,
    about = "Classify the files of a folder by retention policy, then delete or archive them",
    override_usage = "prune [options] <FOLDER>",
    disable_help_flag = true
)]
struct Cli {
    /// Prints much more frequently during execution about what it's doing
    #[arg(short, long)]
    verbose: bool,

    /// Categorizes files, but does not take any actions on them
    #[arg(short, long)]
    dry_run: bool,

    /// Will take action without asking permission; useful for automation
    #[arg(short, long, visible_alias = "no-prompt")]
    force: bool,

    /// The folder in which archives are stored; defaults to <folder>/../<folder-name>-archives
    #[arg(short, long, value_name = "FOLDER")]
    archive_folder: Option<PathBuf>,

    /// Don't perform archival; typically if the files being pruned are already compressed
    #[arg(long)]
    no_archive: bool,

    /// Configure the retention policy for the specified folder
    #[arg(long = "config")]
    configure: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Shows quick help about using prune
    #[arg(short = 'h', short_alias = '?', long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Folder to prune
    folder: Option<PathBuf>,
}

fn prompt_proceed(out: &mut dyn Write, input: &mut dyn BufRead) -> Result<bool> {
    write!(out, "Proceed? [y/N]: ")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(is_affirmative(&line))
}

fn is_affirmative(response: &str) -> bool {
    matches!(
        response.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true"
    )
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for detail in &report.details {
        if detail.starts_with("policy=") && !logging::is_verbose() {
            continue;
        }
        println!("{detail}");
    }
    for issue in &report.issues {
        eprintln!("{issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let Some(folder) = cli.folder.clone() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let cfg = load_config()?;
    let options = PruneOptions {
        verbose: cli.verbose || cfg.verbose,
        dry_run: cli.dry_run,
        prompt: cfg.prompt && !cli.force,
        archive: cfg.archive.enabled && !cli.no_archive,
        archive_folder: cli
            .archive_folder
            .clone()
            .or_else(|| cfg.archive.folder.as_ref().map(PathBuf::from)),
    };
    logging::init(options.verbose, cli.json);

    let report = if cli.configure {
        commands::configure::run(&folder)?
    } else {
        let pruner = Pruner::new(options);
        let mut input = io::stdin().lock();
        if cli.json {
            commands::prune::run(&pruner, &folder, &mut io::stderr(), &mut || {
                prompt_proceed(&mut io::stderr(), &mut input)
            })?
        } else {
            commands::prune::run(&pruner, &folder, &mut io::stdout(), &mut || {
                prompt_proceed(&mut io::stdout(), &mut input)
            })?
        }
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        bail!("{} finished with {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_answers() {
        for answer in ["y\n", "YES", " true "] {
            assert!(is_affirmative(answer), "{answer:?}");
        }
        for answer in ["", "n", "nope", "\n"] {
            assert!(!is_affirmative(answer), "{answer:?}");
        }
    }

    #[test]
    fn prompt_goes_to_the_given_writer() {
        let mut out = Vec::new();
        let mut input = io::Cursor::new("yes\n");
        assert!(prompt_proceed(&mut out, &mut input).expect("prompt"));
        assert_eq!(String::from_utf8(out).expect("utf8"), "Proceed? [y/N]: ");

        let mut out = Vec::new();
        let mut input = io::Cursor::new("");
        assert!(!prompt_proceed(&mut out, &mut input).expect("prompt"));
    }

    #[test]
    fn parses_full_flag_set() {
        let cli = Cli::try_parse_from([
            "prune",
            "-v",
            "--dry-run",
            "--no-prompt",
            "-a",
            "/backups",
            "--no-archive",
            "/var/dumps",
        ])
        .expect("parse");
        assert!(cli.verbose);
        assert!(cli.dry_run);
        assert!(cli.force);
        assert!(cli.no_archive);
        assert_eq!(cli.archive_folder, Some(PathBuf::from("/backups")));
        assert_eq!(cli.folder, Some(PathBuf::from("/var/dumps")));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
