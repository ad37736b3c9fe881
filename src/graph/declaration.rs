//! Resource declarations: a logical name, a kind, configuration, and edges.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::error::GraphError;
use super::kind::ResourceKind;
use crate::policy::{PolicyDocument, PolicyKind};

/// Unique name of a declaration within one graph.
///
/// Non-empty; ASCII alphanumerics, `_` and `-` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalName(String);

impl LogicalName {
    pub fn new(name: impl Into<String>) -> Result<Self, GraphError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(name))
        } else {
            Err(GraphError::InvalidName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference to one of this declaration's computed attributes.
    pub fn output(&self, attribute: &str) -> AttrRef {
        AttrRef {
            resource: self.clone(),
            attribute: attribute.to_string(),
        }
    }

    /// Property whose value is this declaration's computed `attribute`.
    pub fn attr(&self, attribute: &str) -> Property {
        Property::Ref(self.output(attribute))
    }

    /// Property formatted as `{prefix}{attribute}{suffix}` once the attribute is known.
    pub fn interpolate(&self, prefix: &str, attribute: &str, suffix: &str) -> Property {
        Property::Interpolate {
            prefix: prefix.to_string(),
            reference: self.output(attribute),
            suffix: suffix.to_string(),
        }
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for LogicalName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LogicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for LogicalName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for LogicalName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A computed attribute of another declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttrRef {
    pub resource: LogicalName,
    pub attribute: String,
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// A configuration value of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Property {
    String(String),
    Bool(bool),
    Number(i64),
    Map(BTreeMap<String, String>),
    Policy {
        kind: PolicyKind,
        document: PolicyDocument,
    },
    /// Local path packaged and uploaded by the engine.
    Archive(String),
    Ref(AttrRef),
    Interpolate {
        prefix: String,
        reference: AttrRef,
        suffix: String,
    },
}

impl Property {
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Property::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The attribute this value is computed from, if any.
    pub fn reference(&self) -> Option<&AttrRef> {
        match self {
            Property::Ref(reference) | Property::Interpolate { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::String(value.to_string())
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Property::String(value)
    }
}

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Property::Bool(value)
    }
}

impl From<i64> for Property {
    fn from(value: i64) -> Self {
        Property::Number(value)
    }
}

impl From<AttrRef> for Property {
    fn from(value: AttrRef) -> Self {
        Property::Ref(value)
    }
}

/// Desired state of one cloud resource.
///
/// Building a declaration has no side effects; nothing is created until an
/// engine realizes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    name: LogicalName,
    kind: ResourceKind,
    properties: BTreeMap<String, Property>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<LogicalName>,
}

impl Declaration {
    pub fn new(name: &str, kind: ResourceKind) -> Result<Self, GraphError> {
        Ok(Self {
            name: LogicalName::new(name)?,
            kind,
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
        })
    }

    pub fn prop(mut self, key: &str, value: impl Into<Property>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn policy(self, key: &str, kind: PolicyKind, document: PolicyDocument) -> Self {
        self.prop(key, Property::Policy { kind, document })
    }

    /// Orders this declaration after `other` without reading any of its outputs.
    pub fn depends_on(mut self, other: &LogicalName) -> Self {
        if !self.depends_on.contains(other) {
            self.depends_on.push(other.clone());
        }
        self
    }

    pub fn without_explicit_dependencies(mut self) -> Self {
        self.depends_on.clear();
        self
    }

    pub fn name(&self) -> &LogicalName {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn properties(&self) -> &BTreeMap<String, Property> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    pub fn explicit_dependencies(&self) -> &[LogicalName] {
        &self.depends_on
    }

    /// Attribute references embedded in the configuration.
    pub fn references(&self) -> impl Iterator<Item = &AttrRef> {
        self.properties.values().filter_map(Property::reference)
    }

    /// Implicit then explicit dependencies, first occurrence wins.
    pub fn dependencies(&self) -> Vec<&LogicalName> {
        let mut names: Vec<&LogicalName> = Vec::new();
        let implicit = self.references().map(|r| &r.resource);
        for name in implicit.chain(self.depends_on.iter()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Checks every embedded policy document against its kind.
    pub(crate) fn check_policies(&self) -> Result<(), GraphError> {
        for (key, property) in &self.properties {
            if let Property::Policy { kind, document } = property {
                document
                    .validate(*kind)
                    .map_err(|reason| GraphError::InvalidPolicy {
                        resource: self.name.clone(),
                        property: key.clone(),
                        reason,
                    })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_name_rejects_empty_and_spaces() {
        assert!(LogicalName::new("").is_err());
        assert!(LogicalName::new("health api").is_err());
        assert!(LogicalName::new("health/api").is_err());
        assert!(LogicalName::new("health_api-gateway2").is_ok());
    }

    #[test]
    fn test_dependencies_merge_implicit_and_explicit() {
        let role = LogicalName::new("role").unwrap();
        let group = LogicalName::new("group").unwrap();
        let decl = Declaration::new("fn", ResourceKind::LambdaFunction)
            .unwrap()
            .prop("role", role.attr("arn"))
            .prop("role_name", role.attr("name"))
            .depends_on(&group)
            .depends_on(&role);

        let deps: Vec<&str> = decl.dependencies().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(deps, vec!["role", "group"]);
    }

    #[test]
    fn test_depends_on_is_not_duplicated() {
        let group = LogicalName::new("group").unwrap();
        let decl = Declaration::new("fn", ResourceKind::LambdaFunction)
            .unwrap()
            .depends_on(&group)
            .depends_on(&group);
        assert_eq!(decl.explicit_dependencies().len(), 1);
    }

    #[test]
    fn test_interpolate_carries_reference() {
        let api = LogicalName::new("api").unwrap();
        let property = api.interpolate("", "execution_arn", "/*/*/*");
        assert_eq!(property.reference(), Some(&api.output("execution_arn")));
        assert_eq!(Property::from("literal").reference(), None);
    }

    #[test]
    fn test_without_explicit_dependencies_keeps_references() {
        let api = LogicalName::new("api").unwrap();
        let method = LogicalName::new("method").unwrap();
        let decl = Declaration::new("deployment", ResourceKind::ApiDeployment)
            .unwrap()
            .prop("rest_api", api.attr("id"))
            .depends_on(&method)
            .without_explicit_dependencies();
        let deps: Vec<&str> = decl.dependencies().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(deps, vec!["api"]);
    }
}
