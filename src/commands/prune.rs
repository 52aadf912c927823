use anyhow::Result;
use std::io::Write;
use std::path::Path;

use crate::commands::CommandReport;
use crate::prune::policy::PolicySource;
use crate::prune::pruner::{ActionOutcome, Classification, PruneOptions, Pruner};

/// Analysis listing: one block per displayed category, then the count.
pub fn render_analysis(folder: &Path, classification: &Classification, verbose: bool) -> String {
    let mut out = format!("Analyzing '{}':\n", folder.display());
    for (category, files) in classification.entries() {
        let display = verbose || !(category.quiet() || files.is_empty());
        if !display {
            continue;
        }
        out.push_str(&format!("\t{}:\n", category.description()));
        if files.is_empty() {
            out.push_str("\t\tnone\n");
        }
        for file in files {
            out.push_str(&format!("\t\t{file}\n"));
        }
    }
    out.push_str(&format!(
        "\t{} file(s) analyzed\n",
        classification.analyzed()
    ));
    out
}

pub fn run(
    pruner: &Pruner,
    folder: &Path,
    out: &mut dyn Write,
    confirm: &mut dyn FnMut() -> Result<bool>,
) -> Result<CommandReport> {
    let options: &PruneOptions = pruner.options();
    let mut report = CommandReport::new("prune");

    let policy = pruner.load_policy(folder)?;
    match policy.source() {
        PolicySource::File(path) => report.detail(format!("policy={}", path.display())),
        PolicySource::BuiltIn | PolicySource::Programmatic => {
            report.detail("policy=built-in".to_string())
        }
    }

    let classification = pruner.analyze(&policy)?;
    write!(
        out,
        "{}",
        render_analysis(folder, &classification, options.verbose)
    )?;
    out.flush()?;

    if options.dry_run {
        report.detail("dry-run: no actions taken".to_string());
        return Ok(report);
    }

    if options.prompt && classification.requires_prompt() && !confirm()? {
        report.detail("Not proceeding; no actions taken.".to_string());
        return Ok(report);
    }

    let results = pruner.execute(folder, &classification)?;
    let mut acted = 0usize;
    for result in &results {
        acted += result.files;
        report.detail(result.message.clone());
        if let ActionOutcome::Archived(summary) = &result.outcome {
            for failure in &summary.failures {
                report.issue(format!(
                    "archive {} failed ({} file(s) left in place): {}",
                    failure.bucket, failure.files, failure.error
                ));
            }
            for file in &summary.ungrouped {
                report.issue(format!(
                    "{file} could not be grouped for archival; left in place"
                ));
            }
        }
    }
    if acted == 0 {
        report.detail("No actions necessary.".to_string());
    }
    Ok(report)
}
