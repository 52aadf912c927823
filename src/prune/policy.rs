use crate::assets::{DEFAULT_RETENTION, DEFAULT_RETENTION_NAME};
use crate::error::{AttributeError, PruneError};
use crate::prune::attributes::{FileAttributes, Preprocessor, StatPreprocessor};
use crate::prune::category::Category;
use crate::prune::paths::policy_file_path;
use crate::prune::rules::parse_rules;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the categories of a policy came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    BuiltIn,
    File(PathBuf),
    Programmatic,
}

/// Ordered categories plus the implicit "Unmatched Files" fallback.
pub struct RetentionPolicy {
    folder: PathBuf,
    source: PolicySource,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    categories: Vec<Category>,
    default_category: Category,
}

impl RetentionPolicy {
    pub fn builder(folder: impl Into<PathBuf>) -> PolicyBuilder {
        PolicyBuilder {
            folder: folder.into(),
            source: PolicySource::Programmatic,
            preprocessors: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// Resolve the policy for `folder`: its `.prune` file when one exists,
    /// the built-in rules otherwise.
    pub fn load(folder: &Path, today: NaiveDate) -> Result<Self, PruneError> {
        let override_path = policy_file_path(folder);
        let (categories, source) = if override_path.is_file() {
            let raw = fs::read_to_string(&override_path).map_err(|err| {
                PruneError::Configuration(format!(
                    "failed to read {}: {err}",
                    override_path.display()
                ))
            })?;
            let origin = override_path.display().to_string();
            (parse_rules(&raw, &origin)?, PolicySource::File(override_path))
        } else {
            (
                parse_rules(DEFAULT_RETENTION, DEFAULT_RETENTION_NAME)?,
                PolicySource::BuiltIn,
            )
        };

        let mut builder = Self::builder(folder)
            .preprocess(StatPreprocessor::new(today))
            .categories(categories);
        builder.source = source;
        builder.build()
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn source(&self) -> &PolicySource {
        &self.source
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn default_category(&self) -> &Category {
        &self.default_category
    }

    pub fn attributes(&self, file_name: &str) -> Result<FileAttributes, AttributeError> {
        let mut attrs = FileAttributes::new(&self.folder, file_name);
        for preprocessor in &self.preprocessors {
            preprocessor.preprocess(&mut attrs)?;
        }
        Ok(attrs)
    }

    /// First category whose predicate holds, in declared order, or the
    /// fallback. A predicate error stops evaluation.
    pub fn categorize(&self, file_name: &str) -> Result<&Category, PruneError> {
        let attrs = self
            .attributes(file_name)
            .map_err(|source| PruneError::Policy {
                category: "preprocess".to_string(),
                file: file_name.to_string(),
                source,
            })?;

        for category in &self.categories {
            let matched = category
                .includes(&attrs)
                .map_err(|source| PruneError::Policy {
                    category: category.description().to_string(),
                    file: file_name.to_string(),
                    source,
                })?;
            if matched {
                return Ok(category);
            }
        }
        Ok(&self.default_category)
    }
}

pub struct PolicyBuilder {
    folder: PathBuf,
    source: PolicySource,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    categories: Vec<Category>,
}

impl PolicyBuilder {
    /// Register a preprocessing step; steps run in registration order.
    pub fn preprocess<P>(mut self, preprocessor: P) -> Self
    where
        P: Preprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    #[cfg(test)]
    pub fn category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    pub fn categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories.extend(categories);
        self
    }

    pub fn build(self) -> Result<RetentionPolicy, PruneError> {
        if self.categories.is_empty() {
            return Err(PruneError::Configuration(
                "Retention policy contains no categories.".to_string(),
            ));
        }
        Ok(RetentionPolicy {
            folder: self.folder,
            source: self.source,
            preprocessors: self.preprocessors,
            categories: self.categories,
            default_category: Category::unmatched(),
        })
    }
}
