use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub enabled: bool,
    #[serde(default)]
    pub folder: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            folder: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneConfig {
    pub verbose: bool,
    pub prompt: bool,
    pub archive: ArchiveConfig,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            prompt: true,
            archive: ArchiveConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialPruneConfig {
    verbose: Option<bool>,
    prompt: Option<bool>,
    archive: Option<ArchiveConfig>,
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_optional_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &PruneConfig) -> Result<()> {
    if let Some(folder) = &cfg.archive.folder
        && folder.trim().is_empty()
    {
        return Err(anyhow!("invalid archive folder: cannot be empty"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("PRUNE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("prune").join("config.toml"))
}

fn merge_raw_config(base: &mut PruneConfig, raw: &str, path: &Path) -> Result<()> {
    let parsed: PartialPruneConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse prune config {}: {err}", path.display()))?;
    if let Some(verbose) = parsed.verbose {
        base.verbose = verbose;
    }
    if let Some(prompt) = parsed.prompt {
        base.prompt = prompt;
    }
    if let Some(archive) = parsed.archive {
        base.archive = archive;
    }
    Ok(())
}

fn merge_file_config(base: &mut PruneConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_raw_config(base, &raw, &path)
}

/// Defaults, then the config file, then `PRUNE_*` variables. Command-line
/// flags are layered on top by the caller.
pub fn load_config() -> Result<PruneConfig> {
    let mut cfg = PruneConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.verbose = env_or_bool("PRUNE_VERBOSE", cfg.verbose);
    cfg.prompt = env_or_bool("PRUNE_PROMPT", cfg.prompt);
    cfg.archive.enabled = env_or_bool("PRUNE_ARCHIVE_ENABLED", cfg.archive.enabled);
    cfg.archive.folder = env_or_optional_string("PRUNE_ARCHIVE_FOLDER", cfg.archive.folder);

    validate(&cfg)?;
    Ok(cfg)
}
