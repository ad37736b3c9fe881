//! Deterministic in-process engine.
//!
//! Fabricates the computed attributes a real provider would report, derived
//! from the logical name so repeated runs agree. Used by `plan` to preview an
//! apply and by tests to exercise failure propagation.

use std::collections::HashSet;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{EngineError, OrchestrationEngine, Outputs, ResolvedDeclaration};
use crate::graph::ResourceKind;

#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    region: String,
    account_id: String,
    failing: HashSet<String>,
}

impl SimulatedEngine {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            failing: HashSet::new(),
        }
    }

    /// Makes the engine reject the named declaration.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    fn outputs(&self, declaration: &ResolvedDeclaration) -> Outputs {
        let name = declaration.name.as_str();
        let id = short_id(name, 10);
        // Auto-named resources get a suffix, as most providers do
        let physical = format!("{}-{}", name, short_id(name, 7));
        let region = &self.region;
        let account = &self.account_id;
        let prop = |key: &str| declaration.str_property(key).unwrap_or_default().to_string();

        let mut outputs = Outputs::new();
        let mut put = |key: &str, value: String| {
            outputs.insert(key.to_string(), value);
        };

        match declaration.kind {
            ResourceKind::LogGroup => {
                let group = declaration
                    .str_property("name")
                    .map(str::to_string)
                    .unwrap_or(physical);
                put(
                    "arn",
                    format!("arn:aws:logs:{region}:{account}:log-group:{group}"),
                );
                put("id", group.clone());
                put("name", group);
            }
            ResourceKind::IamRole => {
                put("arn", format!("arn:aws:iam::{account}:role/{physical}"));
                put("unique_id", format!("AROA{}", short_id(name, 17).to_uppercase()));
                put("id", physical.clone());
                put("name", physical);
            }
            ResourceKind::IamRolePolicy => {
                put("id", format!("{}:{}", prop("role"), physical));
                put("name", physical);
            }
            ResourceKind::IamPolicy => {
                let path = declaration.str_property("path").unwrap_or("/");
                let arn = format!("arn:aws:iam::{account}:policy{path}{physical}");
                put("policy_id", format!("ANPA{}", short_id(name, 17).to_uppercase()));
                put("id", arn.clone());
                put("arn", arn);
                put("name", physical);
            }
            ResourceKind::LambdaFunction => {
                let arn = format!("arn:aws:lambda:{region}:{account}:function:{physical}");
                put(
                    "invoke_arn",
                    format!(
                        "arn:aws:apigateway:{region}:lambda:path/2015-03-31/functions/{arn}/invocations"
                    ),
                );
                put("qualified_arn", format!("{arn}:$LATEST"));
                put("version", "$LATEST".to_string());
                put("arn", arn);
                put("id", physical.clone());
                put("name", physical);
            }
            ResourceKind::RestApi => {
                put("root_resource_id", short_id(&format!("{name}/"), 10));
                put(
                    "execution_arn",
                    format!("arn:aws:execute-api:{region}:{account}:{id}"),
                );
                put("arn", format!("arn:aws:apigateway:{region}::/restapis/{id}"));
                put("id", id);
            }
            ResourceKind::ApiResource => {
                put("path", format!("/{}", prop("path_part")));
                put("id", short_id(name, 6));
            }
            ResourceKind::ApiMethod => {
                put("http_method", prop("http_method"));
                put("id", id);
            }
            ResourceKind::ApiDeployment => {
                put("created_date", "1970-01-01T00:00:00Z".to_string());
                put("id", id);
            }
            ResourceKind::ApiStage => {
                let rest_api = prop("rest_api");
                let stage = prop("stage_name");
                put(
                    "invoke_url",
                    format!("https://{rest_api}.execute-api.{region}.amazonaws.com/{stage}"),
                );
                put(
                    "execution_arn",
                    format!("arn:aws:execute-api:{region}:{account}:{rest_api}/{stage}"),
                );
                put(
                    "arn",
                    format!("arn:aws:apigateway:{region}::/restapis/{rest_api}/stages/{stage}"),
                );
                put("id", format!("ags-{rest_api}-{stage}"));
                put("stage_name", stage);
            }
            ResourceKind::RolePolicyAttachment
            | ResourceKind::ApiGatewayAccount
            | ResourceKind::LambdaPermission
            | ResourceKind::ApiIntegration
            | ResourceKind::MethodSettings => {
                put("id", physical);
            }
        }

        outputs
    }
}

#[async_trait]
impl OrchestrationEngine for SimulatedEngine {
    async fn realize(&self, declaration: &ResolvedDeclaration) -> Result<Outputs, EngineError> {
        if self.failing.contains(declaration.name.as_str()) {
            return Err(EngineError::Rejected {
                resource: declaration.name.clone(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(self.outputs(declaration))
    }
}

fn short_id(seed: &str, len: usize) -> String {
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    digest[..len.min(digest.len())].to_string()
}
