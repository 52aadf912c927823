use crate::error::{AttributeError, PruneError};
use crate::prune::attributes::{AttrValue, FileAttributes};
use crate::prune::category::{Action, Category};
use serde::Deserialize;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    category: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCategory {
    description: String,
    action: Option<Action>,
    #[serde(default)]
    quiet: bool,
    when: Option<Vec<RawCondition>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    field: String,
    op: Operator,
    value: toml::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: AttrValue,
}

impl Condition {
    pub fn evaluate(&self, attrs: &FileAttributes) -> Result<bool, AttributeError> {
        let actual = attrs.get(&self.field)?;
        match (actual, &self.value) {
            (AttrValue::Int(a), AttrValue::Int(b)) => self.ordered(a.cmp(b)),
            (AttrValue::Bool(a), AttrValue::Bool(b)) => self.ordered(a.cmp(b)),
            (AttrValue::Text(a), AttrValue::Text(b)) => match self.op {
                Operator::Contains => Ok(a.contains(b.as_str())),
                Operator::StartsWith => Ok(a.starts_with(b.as_str())),
                Operator::EndsWith => Ok(a.ends_with(b.as_str())),
                _ => self.ordered(a.cmp(b)),
            },
            (found, expected) => Err(AttributeError::TypeMismatch {
                name: self.field.clone(),
                expected: expected.kind(),
                found: found.kind(),
            }),
        }
    }

    fn ordered(&self, ord: Ordering) -> Result<bool, AttributeError> {
        match self.op {
            Operator::Eq => Ok(ord == Ordering::Equal),
            Operator::Ne => Ok(ord != Ordering::Equal),
            Operator::Lt => Ok(ord == Ordering::Less),
            Operator::Le => Ok(ord != Ordering::Greater),
            Operator::Gt => Ok(ord == Ordering::Greater),
            Operator::Ge => Ok(ord != Ordering::Less),
            op => Err(AttributeError::Invalid(format!(
                "operator `{op}` only applies to text, `{}` is not text",
                self.field
            ))),
        }
    }
}

fn literal(origin: &str, description: &str, value: toml::Value) -> Result<AttrValue, PruneError> {
    match value {
        toml::Value::Integer(v) => Ok(AttrValue::Int(v)),
        toml::Value::Boolean(v) => Ok(AttrValue::Bool(v)),
        toml::Value::String(v) => Ok(AttrValue::Text(v)),
        other => Err(PruneError::Configuration(format!(
            "{origin}: category `{description}` compares against unsupported {} value",
            other.type_str()
        ))),
    }
}

/// Parse a data-only rule file into categories, in declaration order.
///
/// Every condition listed under `when` must hold; `when = []` matches
/// everything, while a missing `when` leaves the category without a
/// predicate and fails like any other incomplete definition.
pub fn parse_rules(source: &str, origin: &str) -> Result<Vec<Category>, PruneError> {
    let parsed: RuleFile = toml::from_str(source)
        .map_err(|err| PruneError::Configuration(format!("failed to parse {origin}: {err}")))?;

    let mut out = Vec::with_capacity(parsed.category.len());
    for raw in parsed.category {
        let mut builder = Category::builder(raw.description.clone());
        if let Some(action) = raw.action {
            builder = builder.action(action);
        }
        if raw.quiet {
            builder = builder.quiet();
        }
        if let Some(when) = raw.when {
            let conditions = when
                .into_iter()
                .map(|c| {
                    Ok(Condition {
                        field: c.field,
                        op: c.op,
                        value: literal(origin, &raw.description, c.value)?,
                    })
                })
                .collect::<Result<Vec<_>, PruneError>>()?;
            builder = builder.predicate(Arc::new(move |attrs: &FileAttributes| {
                for condition in &conditions {
                    if !condition.evaluate(attrs)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }));
        }
        out.push(builder.build()?);
    }
    Ok(out)
}
