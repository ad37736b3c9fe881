//! Typed IAM policy documents.
//!
//! Policies are built as structs and checked when their declaration is added
//! to the graph, so a malformed document fails the run before anything is
//! submitted. Serialization follows the IAM JSON grammar: single-entry
//! `Action`/`Resource` lists collapse to a plain string.

use serde::{Serialize, Serializer};

/// The only policy language version IAM accepts for new documents.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action used by every assume-role trust policy.
pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";

/// What a policy document is attached as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Role trust policy: who may assume the role.
    Trust,
    /// Identity policy: what the holder may do.
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Principal {
    Service(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    #[serde(rename = "Sid")]
    pub sid: String,
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(rename = "Action", serialize_with = "one_or_many")]
    pub actions: Vec<String>,
    #[serde(
        rename = "Resource",
        serialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub resources: Vec<String>,
}

impl Statement {
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_effect(Effect::Allow, actions)
    }

    pub fn deny<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_effect(Effect::Deny, actions)
    }

    fn with_effect<I, S>(effect: Effect, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sid: String::new(),
            effect,
            principal: None,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: Vec::new(),
        }
    }

    /// Adds a resource ARN (or `*`) the statement applies to.
    pub fn on(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn for_service(mut self, service: impl Into<String>) -> Self {
        self.principal = Some(Principal::Service(service.into()));
        self
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = sid.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    /// Trust policy letting an AWS service principal assume the role.
    pub fn trust(service: &str) -> Self {
        Self::new(vec![Statement::allow([ASSUME_ROLE_ACTION]).for_service(service)])
    }

    /// Checks the document against the subset of the IAM grammar this stack uses.
    pub fn validate(&self, kind: PolicyKind) -> Result<(), PolicyError> {
        if self.version != POLICY_VERSION {
            return Err(PolicyError::Version(self.version.clone()));
        }
        if self.statements.is_empty() {
            return Err(PolicyError::Empty);
        }

        for (index, statement) in self.statements.iter().enumerate() {
            if statement.actions.is_empty() {
                return Err(PolicyError::NoActions { index });
            }
            if let Some(action) = statement.actions.iter().find(|a| !is_valid_action(a)) {
                return Err(PolicyError::MalformedAction {
                    index,
                    action: action.clone(),
                });
            }
            if let Some(resource) = statement.resources.iter().find(|r| !is_valid_resource(r)) {
                return Err(PolicyError::MalformedResource {
                    index,
                    resource: resource.clone(),
                });
            }

            match kind {
                PolicyKind::Trust => {
                    if statement.principal.is_none() {
                        return Err(PolicyError::MissingPrincipal { index });
                    }
                }
                PolicyKind::Identity => {
                    if statement.principal.is_some() {
                        return Err(PolicyError::UnexpectedPrincipal { index });
                    }
                    if statement.resources.is_empty() {
                        return Err(PolicyError::NoResources { index });
                    }
                }
            }
        }

        Ok(())
    }
}

/// `*`, or `service:Action` where the action part may carry `*`/`?` wildcards.
fn is_valid_action(action: &str) -> bool {
    if action == "*" {
        return true;
    }
    let Some((service, name)) = action.split_once(':') else {
        return false;
    };
    !service.is_empty()
        && service
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '*' || c == '?')
}

fn is_valid_resource(resource: &str) -> bool {
    resource == "*" || resource.starts_with("arn:")
}

fn one_or_many<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    match values {
        [single] => serializer.serialize_str(single),
        _ => values.serialize(serializer),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("unsupported policy version {0:?}")]
    Version(String),

    #[error("policy has no statements")]
    Empty,

    #[error("statement {index} has no actions")]
    NoActions { index: usize },

    #[error("statement {index} has malformed action {action:?}")]
    MalformedAction { index: usize, action: String },

    #[error("statement {index} has malformed resource {resource:?}")]
    MalformedResource { index: usize, resource: String },

    #[error("statement {index} of an identity policy has no resources")]
    NoResources { index: usize },

    #[error("statement {index} of an identity policy must not name a principal")]
    UnexpectedPrincipal { index: usize },

    #[error("statement {index} of a trust policy needs a principal")]
    MissingPrincipal { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trust_policy_serializes_to_iam_json() {
        let doc = PolicyDocument::trust("lambda.amazonaws.com");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Sid": "",
                    "Effect": "Allow",
                    "Principal": { "Service": "lambda.amazonaws.com" },
                    "Action": "sts:AssumeRole"
                }]
            })
        );
    }

    #[test]
    fn test_multiple_actions_serialize_as_array() {
        let doc = PolicyDocument::new(vec![Statement::allow([
            "logs:CreateLogStream",
            "logs:PutLogEvents",
        ])
        .on("arn:aws:logs:*:*:*")]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value["Statement"][0]["Action"],
            json!(["logs:CreateLogStream", "logs:PutLogEvents"])
        );
        assert_eq!(value["Statement"][0]["Resource"], json!("arn:aws:logs:*:*:*"));
        assert!(value["Statement"][0].get("Principal").is_none());
    }

    #[test]
    fn test_trust_policy_is_valid() {
        let doc = PolicyDocument::trust("apigateway.amazonaws.com");
        assert_eq!(doc.validate(PolicyKind::Trust), Ok(()));
    }

    #[test]
    fn test_trust_policy_is_not_an_identity_policy() {
        let doc = PolicyDocument::trust("apigateway.amazonaws.com");
        assert_eq!(
            doc.validate(PolicyKind::Identity),
            Err(PolicyError::UnexpectedPrincipal { index: 0 })
        );
    }

    #[test]
    fn test_identity_policy_requires_resources() {
        let doc = PolicyDocument::new(vec![Statement::allow(["logs:PutLogEvents"])]);
        assert_eq!(
            doc.validate(PolicyKind::Identity),
            Err(PolicyError::NoResources { index: 0 })
        );
    }

    #[test]
    fn test_rejects_empty_statement_list() {
        let doc = PolicyDocument::new(vec![]);
        assert_eq!(doc.validate(PolicyKind::Identity), Err(PolicyError::Empty));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let mut doc = PolicyDocument::trust("lambda.amazonaws.com");
        doc.version = "2008-10-17".to_string();
        assert_eq!(
            doc.validate(PolicyKind::Trust),
            Err(PolicyError::Version("2008-10-17".to_string()))
        );
    }

    #[test]
    fn test_rejects_malformed_action() {
        let doc = PolicyDocument::new(vec![Statement::allow(["PutLogEvents"]).on("*")]);
        assert_eq!(
            doc.validate(PolicyKind::Identity),
            Err(PolicyError::MalformedAction {
                index: 0,
                action: "PutLogEvents".to_string()
            })
        );
    }

    #[test]
    fn test_rejects_malformed_resource() {
        let doc = PolicyDocument::new(vec![Statement::allow(["logs:*"]).on("logs")]);
        assert!(matches!(
            doc.validate(PolicyKind::Identity),
            Err(PolicyError::MalformedResource { .. })
        ));
    }

    #[test]
    fn test_trust_statement_without_principal_is_rejected() {
        let doc = PolicyDocument::new(vec![Statement::allow([ASSUME_ROLE_ACTION])]);
        assert_eq!(
            doc.validate(PolicyKind::Trust),
            Err(PolicyError::MissingPrincipal { index: 0 })
        );
    }

    #[test]
    fn test_action_wildcards() {
        assert!(is_valid_action("*"));
        assert!(is_valid_action("logs:*"));
        assert!(is_valid_action("logs:Describe*"));
        assert!(is_valid_action("lambda:InvokeFunction"));
        assert!(!is_valid_action("logs:"));
        assert!(!is_valid_action(":Put"));
        assert!(!is_valid_action("Logs:Put"));
    }
}
