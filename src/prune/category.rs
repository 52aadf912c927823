use crate::error::{AttributeError, PruneError};
use crate::prune::attributes::FileAttributes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Ignore,
    Retain,
    Remove,
    Archive,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Retain => "retain",
            Self::Remove => "remove",
            Self::Archive => "archive",
        }
    }

    /// Remove and archive touch files, so they need confirmation.
    pub fn requires_prompt(self) -> bool {
        matches!(self, Self::Remove | Self::Archive)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Predicate = Arc<dyn Fn(&FileAttributes) -> Result<bool, AttributeError>>;

#[derive(Clone)]
pub struct Category {
    description: String,
    action: Action,
    quiet: bool,
    predicate: Predicate,
}

impl Category {
    pub fn builder(description: impl Into<String>) -> CategoryBuilder {
        CategoryBuilder::new(description)
    }

    /// The "Unmatched Files" fallback used when no declared category matches.
    pub fn unmatched() -> Self {
        Self {
            description: "Unmatched Files".to_string(),
            action: Action::Retain,
            quiet: true,
            predicate: Arc::new(|_| Ok(true)),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn requires_prompt(&self) -> bool {
        self.action.requires_prompt()
    }

    pub fn includes(&self, attrs: &FileAttributes) -> Result<bool, AttributeError> {
        (self.predicate)(attrs)
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Category")
            .field("description", &self.description)
            .field("action", &self.action)
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct CategoryBuilder {
    description: String,
    action: Option<Action>,
    quiet: bool,
    predicate: Option<Predicate>,
}

impl CategoryBuilder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FileAttributes) -> Result<bool, AttributeError> + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    #[cfg(test)]
    pub fn ignore(self) -> Self {
        self.action(Action::Ignore)
    }

    #[cfg(test)]
    pub fn retain(self) -> Self {
        self.action(Action::Retain)
    }

    #[cfg(test)]
    pub fn remove(self) -> Self {
        self.action(Action::Remove)
    }

    #[cfg(test)]
    pub fn archive(self) -> Self {
        self.action(Action::Archive)
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn build(self) -> Result<Category, PruneError> {
        let Some(predicate) = self.predicate else {
            return Err(PruneError::no_predicate(&self.description));
        };
        let Some(action) = self.action else {
            return Err(PruneError::no_action(&self.description));
        };
        Ok(Category {
            description: self.description,
            action,
            quiet: self.quiet,
            predicate,
        })
    }
}
