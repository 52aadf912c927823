use crate::error::PruneError;
use crate::logging;
use crate::prune::paths::{container_path, default_archive_dir};
use crate::prune::removal::{RemovalOutcome, remove_files};
use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    pub bucket: String,
    pub container: PathBuf,
    pub created: bool,
    pub previous_entries: usize,
    pub added: usize,
    pub removal: RemovalOutcome,
}

/// Writes month containers into the destination folder, merging with any
/// container an earlier run left behind.
#[derive(Debug, Clone)]
pub struct Archiver {
    source: PathBuf,
    destination: PathBuf,
}

impl Archiver {
    pub fn new(source: impl Into<PathBuf>, destination: Option<PathBuf>) -> Self {
        let source = source.into();
        let destination = destination.unwrap_or_else(|| default_archive_dir(&source));
        Self {
            source,
            destination,
        }
    }

    #[cfg(test)]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn ensure_destination(&self) -> Result<(), PruneError> {
        if self.destination.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.destination).map_err(|source| PruneError::Destination {
            path: self.destination.clone(),
            source,
        })?;
        logging::verbose(format!(
            "Created archive folder {}.",
            self.destination.display()
        ));
        Ok(())
    }

    /// Add `files` (names inside the source folder) to the bucket's
    /// container, then delete them from the source folder.
    ///
    /// Sources are only removed once the container has been fully written
    /// and moved into place; any read or write failure leaves both the old
    /// container and the sources untouched.
    pub fn archive(&self, bucket: &str, files: &[String]) -> Result<ArchiveOutcome> {
        self.ensure_destination()?;
        let container = container_path(&self.destination, bucket);
        let sources = files
            .iter()
            .map(|name| (name.clone(), self.source.join(name)))
            .collect::<Vec<_>>();

        let (created, previous_entries) = if container.exists() {
            logging::verbose(format!("Archive file {} exists.", container.display()));
            let previous = self.update_container(&container, &sources)?;
            logging::verbose(format!(
                "Added {} file(s) to {} archive already containing {} file(s).",
                sources.len(),
                container.display(),
                previous
            ));
            (false, previous)
        } else {
            self.write_container(&container, &sources)?;
            logging::verbose(format!(
                "Compressed {} file(s) into {} archive.",
                sources.len(),
                container.display()
            ));
            (true, 0)
        };

        let paths = sources.into_iter().map(|(_, path)| path).collect::<Vec<_>>();
        let removal = remove_files(&paths, "archive", &container.display().to_string());
        logging::verbose(format!(
            "Removing {} source files that have been archived.",
            removal.removed
        ));

        Ok(ArchiveOutcome {
            bucket: bucket.to_string(),
            container,
            created,
            previous_entries,
            added: files.len(),
            removal,
        })
    }

    fn update_container(&self, container: &Path, sources: &[(String, PathBuf)]) -> Result<usize> {
        let scratch = TempDir::new_in(&self.destination).with_context(|| {
            format!(
                "failed to create scratch folder in {}",
                self.destination.display()
            )
        })?;
        logging::verbose(format!(
            "Created temporary directory {} to extract contents of existing archive file.",
            scratch.path().display()
        ));

        let extracted = extract_entries(container, scratch.path())?;
        let previous = extracted.len();
        let incoming = sources
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<BTreeSet<_>>();
        let mut entries = extracted
            .into_iter()
            .filter(|(name, _)| !incoming.contains(name.as_str()))
            .collect::<Vec<_>>();
        entries.extend(sources.iter().cloned());

        self.write_container(container, &entries)?;
        scratch
            .close()
            .with_context(|| format!("failed to clean up scratch folder for {}", container.display()))?;
        Ok(previous)
    }

    fn write_container(&self, container: &Path, entries: &[(String, PathBuf)]) -> Result<()> {
        let mut staged = NamedTempFile::new_in(&self.destination).with_context(|| {
            format!(
                "failed to stage archive in {}",
                self.destination.display()
            )
        })?;
        {
            let encoder = GzEncoder::new(staged.as_file_mut(), Compression::default());
            let mut builder = tar::Builder::new(encoder);
            for (name, path) in entries {
                builder
                    .append_path_with_name(path, name)
                    .with_context(|| format!("failed to add {} to archive", path.display()))?;
            }
            builder
                .into_inner()
                .and_then(|encoder| encoder.finish())
                .with_context(|| format!("failed to write {}", container.display()))?;
        }
        let permissions = match fs::metadata(container) {
            Ok(meta) => meta.permissions(),
            Err(_) => fresh_container_permissions(staged.as_file())?,
        };
        staged
            .as_file()
            .set_permissions(permissions)
            .with_context(|| format!("failed to set permissions on {}", container.display()))?;
        staged
            .as_file()
            .sync_all()
            .with_context(|| format!("failed to flush {}", container.display()))?;
        staged
            .persist(container)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to replace {}", container.display()))?;
        Ok(())
    }
}

/// Staged files are owner-only; a new container gets ordinary file modes.
#[cfg(unix)]
fn fresh_container_permissions(_staged: &File) -> Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn fresh_container_permissions(staged: &File) -> Result<fs::Permissions> {
    Ok(staged.metadata()?.permissions())
}

fn normalized_entry_path(stored: &Path) -> PathBuf {
    stored
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Unpack every regular file of `container` into `scratch`, returning
/// `(entry name, extracted path)` in stored order. A name stored twice keeps
/// its first position and its last content.
fn extract_entries(container: &Path, scratch: &Path) -> Result<Vec<(String, PathBuf)>> {
    let file =
        File::open(container).with_context(|| format!("failed to open {}", container.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    let entries = archive
        .entries()
        .with_context(|| format!("failed to read {}", container.display()))?;
    for entry in entries {
        let mut entry = entry.with_context(|| format!("failed to read {}", container.display()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let relative = normalized_entry_path(&entry.path()?);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let unpacked = entry
            .unpack_in(scratch)
            .with_context(|| format!("failed to extract {}", relative.display()))?;
        if !unpacked {
            continue;
        }
        let name = relative.to_string_lossy().into_owned();
        if seen.insert(name.clone()) {
            out.push((name, scratch.join(&relative)));
        }
    }
    Ok(out)
}

/// Entry names of a container, in stored order.
#[cfg(test)]
pub fn list_container(container: &Path) -> Result<Vec<String>> {
    let file =
        File::open(container).with_context(|| format!("failed to open {}", container.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}
