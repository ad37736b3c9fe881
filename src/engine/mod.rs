//! Apply driver for the orchestration engine boundary.
//!
//! The engine itself (diffing against live state, provider calls, retries) is
//! external and sits behind [`OrchestrationEngine`]. The driver walks a
//! validated graph in dependency order, replaces every attribute reference
//! with the value read back from the dependency's outputs, and records one
//! [`Outcome`] per declaration. A failed declaration blocks everything that
//! depends on it; independent branches still run. Nothing is retried.
//!
//! Key re-exports:
//! - [`SimulatedEngine`] - deterministic engine for previews and tests

mod simulated;

pub use simulated::SimulatedEngine;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::graph::{AttrRef, Declaration, DeploymentGraph, GraphError, LogicalName, Property, ResourceKind};

/// Computed attributes reported by the engine, keyed by attribute name.
pub type Outputs = BTreeMap<String, String>;

/// A declaration with every reference replaced by its concrete value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDeclaration {
    pub name: LogicalName,
    pub kind: ResourceKind,
    pub properties: BTreeMap<String, Value>,
}

impl ResolvedDeclaration {
    /// Resolves `declaration` against the outputs of already realized declarations.
    pub fn resolve(
        declaration: &Declaration,
        realized: &HashMap<LogicalName, Outputs>,
    ) -> Result<Self, EngineError> {
        let lookup = |reference: &AttrRef| -> Result<String, EngineError> {
            realized
                .get(&reference.resource)
                .and_then(|outputs| outputs.get(&reference.attribute))
                .cloned()
                .ok_or_else(|| EngineError::MissingOutput {
                    resource: reference.resource.clone(),
                    attribute: reference.attribute.clone(),
                })
        };

        let mut properties = BTreeMap::new();
        for (key, property) in declaration.properties() {
            let value = match property {
                Property::String(s) => Value::String(s.clone()),
                Property::Bool(b) => Value::Bool(*b),
                Property::Number(n) => Value::from(*n),
                Property::Map(map) => json!(map),
                Property::Policy { document, .. } => {
                    let encoded =
                        serde_json::to_string(document).map_err(|e| EngineError::Encode {
                            resource: declaration.name().clone(),
                            property: key.clone(),
                            message: e.to_string(),
                        })?;
                    Value::String(encoded)
                }
                Property::Archive(path) => json!({ "archive": path }),
                Property::Ref(reference) => Value::String(lookup(reference)?),
                Property::Interpolate {
                    prefix,
                    reference,
                    suffix,
                } => Value::String(format!("{}{}{}", prefix, lookup(reference)?, suffix)),
            };
            properties.insert(key.clone(), value);
        }

        Ok(Self {
            name: declaration.name().clone(),
            kind: declaration.kind(),
            properties,
        })
    }

    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// Realization errors. Surfaced in the report, never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("provider rejected {resource}: {message}")]
    Rejected {
        resource: LogicalName,
        message: String,
    },

    #[error("{resource} did not report output {attribute}")]
    MissingOutput {
        resource: LogicalName,
        attribute: String,
    },

    #[error("failed to encode {resource}.{property}: {message}")]
    Encode {
        resource: LogicalName,
        property: String,
        message: String,
    },
}

/// External engine that turns a desired-state declaration into a live resource.
#[async_trait]
pub trait OrchestrationEngine: Send + Sync {
    /// Creates or updates the resource and returns its computed attributes.
    async fn realize(&self, declaration: &ResolvedDeclaration) -> Result<Outputs, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied { outputs: Outputs },
    Failed { error: String },
    /// Not attempted because a dependency did not apply
    Skipped { blocked_by: LogicalName },
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyEntry {
    pub name: LogicalName,
    pub kind: ResourceKind,
    pub outcome: Outcome,
}

/// Per-declaration outcomes in the order they were decided.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub entries: Vec<ApplyEntry>,
}

impl ApplyReport {
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.outcome)
    }

    pub fn applied(&self) -> impl Iterator<Item = &LogicalName> {
        self.with_status(|o| matches!(o, Outcome::Applied { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &LogicalName> {
        self.with_status(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &LogicalName> {
        self.with_status(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| matches!(entry.outcome, Outcome::Applied { .. }))
    }

    fn with_status<F>(&self, predicate: F) -> impl Iterator<Item = &LogicalName>
    where
        F: Fn(&Outcome) -> bool,
    {
        self.entries
            .iter()
            .filter(move |entry| predicate(&entry.outcome))
            .map(|entry| &entry.name)
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match &entry.outcome {
                Outcome::Applied { .. } => writeln!(f, "  + {} ({})", entry.name, entry.kind)?,
                Outcome::Failed { error } => {
                    writeln!(f, "  x {} ({}): {}", entry.name, entry.kind, error)?
                }
                Outcome::Skipped { blocked_by } => writeln!(
                    f,
                    "  - {} ({}): blocked by {}",
                    entry.name, entry.kind, blocked_by
                )?,
            }
        }
        let count = |predicate: fn(&Outcome) -> bool| {
            self.entries.iter().filter(|e| predicate(&e.outcome)).count()
        };
        write!(
            f,
            "{} applied, {} failed, {} skipped",
            count(|o| matches!(o, Outcome::Applied { .. })),
            count(|o| matches!(o, Outcome::Failed { .. })),
            count(|o| matches!(o, Outcome::Skipped { .. })),
        )
    }
}

/// Realizes `graph` against `engine`, one declaration at a time, in
/// dependency order.
///
/// Construction errors abort before the engine sees anything. Realization
/// errors are recorded and block only the failed declaration's dependents.
pub async fn apply<E>(graph: &DeploymentGraph, engine: &E) -> Result<ApplyReport, GraphError>
where
    E: OrchestrationEngine + ?Sized,
{
    graph.validate()?;
    let order = graph.topological_order()?;

    let mut realized: HashMap<LogicalName, Outputs> = HashMap::new();
    let mut report = ApplyReport::default();

    for declaration in order {
        let name = declaration.name();
        let blocked_by = declaration
            .dependencies()
            .into_iter()
            .find(|dep| !realized.contains_key(*dep))
            .cloned();

        let outcome = match blocked_by {
            Some(blocked_by) => {
                tracing::warn!(name = %name, blocked_by = %blocked_by, "Skipping declaration");
                Outcome::Skipped { blocked_by }
            }
            None => {
                let result = match ResolvedDeclaration::resolve(declaration, &realized) {
                    Ok(resolved) => engine.realize(&resolved).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(outputs) => {
                        tracing::info!(name = %name, kind = %declaration.kind(), "Applied declaration");
                        realized.insert(name.clone(), outputs.clone());
                        Outcome::Applied { outputs }
                    }
                    Err(e) => {
                        tracing::error!(name = %name, error = %e, "Failed to apply declaration");
                        Outcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
        };

        report.entries.push(ApplyEntry {
            name: name.clone(),
            kind: declaration.kind(),
            outcome,
        });
    }

    Ok(report)
}
