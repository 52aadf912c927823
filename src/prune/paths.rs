use std::fs;
use std::path::{Path, PathBuf};

pub const POLICY_FILE_NAME: &str = ".prune";

pub fn policy_file_path(folder: &Path) -> PathBuf {
    folder.join(POLICY_FILE_NAME)
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// `<parent>/<name>-archives` next to the source folder.
pub fn default_archive_dir(source: &Path) -> PathBuf {
    let absolute = absolute(source);
    let name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    let parent = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    parent.join(format!("{name}-archives"))
}

pub fn container_path(destination: &Path, bucket: &str) -> PathBuf {
    destination.join(format!("archive-{bucket}.tar.gz"))
}
