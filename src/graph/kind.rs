//! Resource kinds and the computed attributes each one exports.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    LogGroup,
    IamRole,
    IamRolePolicy,
    IamPolicy,
    RolePolicyAttachment,
    ApiGatewayAccount,
    LambdaFunction,
    RestApi,
    ApiResource,
    ApiMethod,
    LambdaPermission,
    ApiIntegration,
    ApiDeployment,
    ApiStage,
    MethodSettings,
}

impl ResourceKind {
    /// Provider type token the orchestration engine keys resources by.
    pub fn provider_type(&self) -> &'static str {
        match self {
            ResourceKind::LogGroup => "aws:cloudwatch/logGroup:LogGroup",
            ResourceKind::IamRole => "aws:iam/role:Role",
            ResourceKind::IamRolePolicy => "aws:iam/rolePolicy:RolePolicy",
            ResourceKind::IamPolicy => "aws:iam/policy:Policy",
            ResourceKind::RolePolicyAttachment => {
                "aws:iam/rolePolicyAttachment:RolePolicyAttachment"
            }
            ResourceKind::ApiGatewayAccount => "aws:apigateway/account:Account",
            ResourceKind::LambdaFunction => "aws:lambda/function:Function",
            ResourceKind::RestApi => "aws:apigateway/restApi:RestApi",
            ResourceKind::ApiResource => "aws:apigateway/resource:Resource",
            ResourceKind::ApiMethod => "aws:apigateway/method:Method",
            ResourceKind::LambdaPermission => "aws:lambda/permission:Permission",
            ResourceKind::ApiIntegration => "aws:apigateway/integration:Integration",
            ResourceKind::ApiDeployment => "aws:apigateway/deployment:Deployment",
            ResourceKind::ApiStage => "aws:apigateway/stage:Stage",
            ResourceKind::MethodSettings => "aws:apigateway/methodSettings:MethodSettings",
        }
    }

    /// Attributes known only after the provider creates the resource.
    pub fn exports(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::LogGroup => &["id", "name", "arn"],
            ResourceKind::IamRole => &["id", "name", "arn", "unique_id"],
            ResourceKind::IamRolePolicy => &["id", "name"],
            ResourceKind::IamPolicy => &["id", "name", "arn", "policy_id"],
            ResourceKind::RolePolicyAttachment => &["id"],
            ResourceKind::ApiGatewayAccount => &["id"],
            ResourceKind::LambdaFunction => {
                &["id", "name", "arn", "invoke_arn", "qualified_arn", "version"]
            }
            ResourceKind::RestApi => &["id", "arn", "root_resource_id", "execution_arn"],
            ResourceKind::ApiResource => &["id", "path"],
            ResourceKind::ApiMethod => &["id", "http_method"],
            ResourceKind::LambdaPermission => &["id"],
            ResourceKind::ApiIntegration => &["id"],
            ResourceKind::ApiDeployment => &["id", "created_date"],
            ResourceKind::ApiStage => &["id", "arn", "stage_name", "invoke_url", "execution_arn"],
            ResourceKind::MethodSettings => &["id"],
        }
    }

    pub fn exports_attribute(&self, attribute: &str) -> bool {
        self.exports().contains(&attribute)
    }

    /// Whether the kind is part of the publicly invokable API surface.
    pub fn is_public_surface(&self) -> bool {
        matches!(
            self,
            ResourceKind::RestApi
                | ResourceKind::ApiResource
                | ResourceKind::ApiMethod
                | ResourceKind::ApiIntegration
                | ResourceKind::ApiDeployment
                | ResourceKind::ApiStage
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_type())
    }
}
