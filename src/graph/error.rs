use crate::policy::PolicyError;

use super::declaration::LogicalName;
use super::kind::ResourceKind;

/// Construction errors: the graph is rejected before anything is submitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("invalid logical name {0:?}: use ASCII letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("duplicate logical name: {0}")]
    DuplicateName(LogicalName),

    #[error("{from} depends on undefined declaration {missing}")]
    UndefinedDependency {
        from: LogicalName,
        missing: LogicalName,
    },

    #[error("{from} references {resource}.{attribute}, which {kind} does not export")]
    UnknownAttribute {
        from: LogicalName,
        resource: LogicalName,
        attribute: String,
        kind: ResourceKind,
    },

    #[error("dependency cycle: {}", format_cycle(.0))]
    Cycle(Vec<LogicalName>),

    #[error("invalid policy in {resource}.{property}: {reason}")]
    InvalidPolicy {
        resource: LogicalName,
        property: String,
        reason: PolicyError,
    },

    #[error("public surface: {0}")]
    PublicSurface(String),

    #[error("no declaration named {0}")]
    UnknownDeclaration(String),

    #[error("failed to encode {0}")]
    Encode(String),
}

fn format_cycle(names: &[LogicalName]) -> String {
    names
        .iter()
        .map(LogicalName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
