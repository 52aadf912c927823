use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PruneError {
    #[error("retention policy is invalid: {0}")]
    Configuration(String),
    #[error("{0}")]
    Definition(String),
    #[error("category `{category}` failed on {file}")]
    Policy {
        category: String,
        file: String,
        #[source]
        source: AttributeError,
    },
    #[error("Archive folder {} does not exist and cannot be created.", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot find folder: {}", .0.display())]
    MissingFolder(PathBuf),
    #[error("{} is not a folder", .0.display())]
    NotAFolder(PathBuf),
}

#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("attribute `{0}` is not defined")]
    Undefined(String),
    #[error("attribute `{name}` is {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0}")]
    Invalid(String),
}

impl PruneError {
    pub fn no_predicate(description: &str) -> Self {
        Self::Definition(format!("{description} has no predicate defined"))
    }

    pub fn no_action(description: &str) -> Self {
        Self::Definition(format!("{description} has no action defined"))
    }
}
