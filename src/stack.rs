//! The health API stack as a deployment graph.
//!
//! `build` declares every resource the service needs: the API Gateway
//! account logging role, the Lambda function with its execution role and
//! logging policy, and the REST API that proxies every path to the function
//! and publishes it on one stage. Building is pure: the same config and
//! trigger time always produce the same graph.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::config::{DeploymentTrigger, StackConfig};
use crate::graph::{Declaration, DeploymentGraph, GraphError, Property, ResourceKind};
use crate::policy::{PolicyDocument, PolicyKind, Statement};

const APIGATEWAY_SERVICE: &str = "apigateway.amazonaws.com";
const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";

/// Actions the API Gateway account role needs to write execution logs.
const APIGATEWAY_LOG_ACTIONS: [&str; 7] = [
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:DescribeLogGroups",
    "logs:DescribeLogStreams",
    "logs:PutLogEvents",
    "logs:GetLogEvents",
    "logs:FilterLogEvents",
];

/// Actions the Lambda execution role needs to write function logs.
const LAMBDA_LOG_ACTIONS: [&str; 3] = [
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

const LAMBDA_LOG_RESOURCE: &str = "arn:aws:logs:*:*:*";

/// Path part that forwards every sub-path to the integration.
pub const PROXY_PATH_PART: &str = "{proxy+}";

/// Method settings path covering every resource and method.
pub const ALL_METHODS_PATH: &str = "*/*";

/// Logical names of the declarations `build` produces.
pub mod names {
    pub const LOG_GROUP: &str = "health_api_gateway_log_group";
    pub const CLOUDWATCH_ROLE: &str = "cloudwatchRole";
    pub const LAMBDA_ROLE: &str = "iamHealthLambda";
    pub const CLOUDWATCH_ROLE_POLICY: &str = "cloudwatchRolePolicy";
    pub const API_ACCOUNT: &str = "health_api_gateway_account";
    pub const LAMBDA_LOGGING_POLICY: &str = "health_api_gateway_lambda_loggin_policy";
    pub const LAMBDA_LOGGING_ATTACHMENT: &str = "health_api_gateway_logging";
    pub const LAMBDA: &str = "healthLambda";
    pub const REST_API: &str = "health_apigateway";
    pub const API_RESOURCE: &str = "health_api_gateway_resource";
    pub const API_METHOD: &str = "health_api_gateway_method";
    pub const LAMBDA_PERMISSION: &str = "allow_health_api_gateway";
    pub const API_INTEGRATION: &str = "health_api_gateway_integration";
    pub const API_DEPLOYMENT: &str = "health_deployment";
    pub const API_STAGE: &str = "health_api_gateway_stage";
    pub const METHOD_SETTINGS: &str = "health_api_gateway_method_settings_all";
}

/// Declares the health stack and validates the result.
///
/// `trigger_time` feeds the deployment trigger when the config asks for a
/// timestamp; it is passed in rather than read here so building stays pure.
pub fn build(
    config: &StackConfig,
    trigger_time: DateTime<Utc>,
) -> Result<DeploymentGraph, GraphError> {
    let mut graph = DeploymentGraph::new();

    // Logging
    let log_group = graph.add(
        Declaration::new(names::LOG_GROUP, ResourceKind::LogGroup)?
            .prop("name", config.log_group_name.as_str()),
    )?;

    let cloudwatch_role = graph.add(
        Declaration::new(names::CLOUDWATCH_ROLE, ResourceKind::IamRole)?.policy(
            "assume_role_policy",
            PolicyKind::Trust,
            PolicyDocument::trust(APIGATEWAY_SERVICE),
        ),
    )?;

    let lambda_role = graph.add(
        Declaration::new(names::LAMBDA_ROLE, ResourceKind::IamRole)?.policy(
            "assume_role_policy",
            PolicyKind::Trust,
            PolicyDocument::trust(LAMBDA_SERVICE),
        ),
    )?;

    graph.add(
        Declaration::new(names::CLOUDWATCH_ROLE_POLICY, ResourceKind::IamRolePolicy)?
            .prop("role", cloudwatch_role.attr("id"))
            .policy(
                "policy",
                PolicyKind::Identity,
                PolicyDocument::new(vec![Statement::allow(APIGATEWAY_LOG_ACTIONS).on("*")]),
            ),
    )?;

    graph.add(
        Declaration::new(names::API_ACCOUNT, ResourceKind::ApiGatewayAccount)?
            .prop("cloudwatch_role_arn", cloudwatch_role.attr("arn")),
    )?;

    let logging_policy = graph.add(
        Declaration::new(names::LAMBDA_LOGGING_POLICY, ResourceKind::IamPolicy)?
            .prop("path", "/")
            .prop("description", "IAM policy for logging from a lambda")
            .policy(
                "policy",
                PolicyKind::Identity,
                PolicyDocument::new(vec![
                    Statement::allow(LAMBDA_LOG_ACTIONS).on(LAMBDA_LOG_RESOURCE)
                ]),
            ),
    )?;

    let logging_attachment = graph.add(
        Declaration::new(names::LAMBDA_LOGGING_ATTACHMENT, ResourceKind::RolePolicyAttachment)?
            .prop("role", lambda_role.attr("name"))
            .prop("policy_arn", logging_policy.attr("arn")),
    )?;

    // Function: must not start before it is allowed to log
    let lambda = graph.add(
        Declaration::new(names::LAMBDA, ResourceKind::LambdaFunction)?
            .prop("code", Property::Archive(config.lambda_code_path.clone()))
            .prop("role", lambda_role.attr("arn"))
            .prop("handler", config.lambda_handler.as_str())
            .prop("runtime", config.lambda_runtime.as_str())
            .prop(
                "environment",
                Property::Map(config.lambda_environment.clone()),
            )
            .depends_on(&logging_attachment)
            .depends_on(&log_group),
    )?;

    // API surface
    let rest_api = graph.add(Declaration::new(names::REST_API, ResourceKind::RestApi)?)?;

    let api_resource = graph.add(
        Declaration::new(names::API_RESOURCE, ResourceKind::ApiResource)?
            .prop("parent_id", rest_api.attr("root_resource_id"))
            .prop("rest_api", rest_api.attr("id"))
            .prop("path_part", PROXY_PATH_PART),
    )?;

    let api_method = graph.add(
        Declaration::new(names::API_METHOD, ResourceKind::ApiMethod)?
            .prop("authorization", "NONE")
            .prop("http_method", "ANY")
            .prop("resource_id", api_resource.attr("id"))
            .prop("rest_api", rest_api.attr("id")),
    )?;

    graph.add(
        Declaration::new(names::LAMBDA_PERMISSION, ResourceKind::LambdaPermission)?
            .prop("action", "lambda:InvokeFunction")
            .prop("function", lambda.attr("name"))
            .prop("principal", APIGATEWAY_SERVICE)
            .prop(
                "source_arn",
                rest_api.interpolate("", "execution_arn", "/*/*/*"),
            ),
    )?;

    let integration = Declaration::new(names::API_INTEGRATION, ResourceKind::ApiIntegration)?
        .prop("rest_api", rest_api.attr("id"))
        .prop("resource_id", api_resource.attr("id"))
        .prop("http_method", api_method.attr("http_method"))
        .prop("type", "AWS_PROXY")
        .prop("integration_http_method", "POST")
        .prop("uri", lambda.attr("invoke_arn"));

    let triggers = deployment_triggers(config.deployment_trigger, trigger_time, &graph, &integration)?;
    let api_integration = graph.add(integration)?;

    // Deployment reads nothing from method or integration, so order it explicitly
    let mut deployment = Declaration::new(names::API_DEPLOYMENT, ResourceKind::ApiDeployment)?
        .prop("rest_api", rest_api.attr("id"))
        .depends_on(&api_method)
        .depends_on(&api_integration);
    if let Some(triggers) = triggers {
        deployment = deployment.prop("triggers", triggers);
    }
    let deployment = graph.add(deployment)?;

    let stage = graph.add(
        Declaration::new(names::API_STAGE, ResourceKind::ApiStage)?
            .prop("deployment", deployment.attr("id"))
            .prop("rest_api", rest_api.attr("id"))
            .prop("stage_name", config.stage_name.as_str())
            .prop("xray_tracing_enabled", config.xray_tracing),
    )?;

    graph.add(
        Declaration::new(names::METHOD_SETTINGS, ResourceKind::MethodSettings)?
            .prop("rest_api", rest_api.attr("id"))
            .prop("stage_name", stage.attr("stage_name"))
            .prop("method_path", ALL_METHODS_PATH)
            .prop("metrics_enabled", config.metrics_enabled)
            .prop("logging_level", config.logging_level.as_str()),
    )?;

    graph.validate()?;
    let sink = graph.public_sink()?;
    tracing::debug!(
        declarations = graph.len(),
        public_sink = %sink,
        "Built health stack"
    );

    Ok(graph)
}

fn deployment_triggers(
    trigger: DeploymentTrigger,
    trigger_time: DateTime<Utc>,
    graph: &DeploymentGraph,
    integration: &Declaration,
) -> Result<Option<Property>, GraphError> {
    match trigger {
        DeploymentTrigger::Timestamp => {
            Ok(Some(Property::map([("date", trigger_time.to_rfc3339())])))
        }
        DeploymentTrigger::ContentHash => {
            let surface: Vec<&Declaration> = [names::API_RESOURCE, names::API_METHOD]
                .into_iter()
                .filter_map(|name| graph.get(name))
                .chain(std::iter::once(integration))
                .collect();
            let encoded =
                serde_json::to_vec(&surface).map_err(|e| GraphError::Encode(e.to_string()))?;
            let digest = format!("{:x}", Sha256::digest(&encoded));
            Ok(Some(Property::map([("content", digest)])))
        }
        DeploymentTrigger::None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LogicalName;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_declares_sixteen_resources() {
        let graph = build(&StackConfig::default(), fixed_time()).unwrap();
        assert_eq!(graph.len(), 16);
    }

    #[test]
    fn test_lambda_waits_for_logging() {
        let graph = build(&StackConfig::default(), fixed_time()).unwrap();
        let lambda = graph.get(names::LAMBDA).unwrap();
        let explicit: Vec<&str> = lambda
            .explicit_dependencies()
            .iter()
            .map(LogicalName::as_str)
            .collect();
        assert_eq!(
            explicit,
            vec![names::LAMBDA_LOGGING_ATTACHMENT, names::LOG_GROUP]
        );
    }

    #[test]
    fn test_timestamp_trigger_uses_given_time() {
        let graph = build(&StackConfig::default(), fixed_time()).unwrap();
        let deployment = graph.get(names::API_DEPLOYMENT).unwrap();
        assert_eq!(
            deployment.property("triggers"),
            Some(&Property::map([("date", "2024-05-01T12:00:00+00:00")]))
        );
    }

    #[test]
    fn test_content_hash_trigger_ignores_time() {
        let config = StackConfig {
            deployment_trigger: DeploymentTrigger::ContentHash,
            ..StackConfig::default()
        };
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = build(&config, fixed_time()).unwrap();
        let b = build(&config, later).unwrap();
        assert_eq!(
            a.get(names::API_DEPLOYMENT).unwrap().property("triggers"),
            b.get(names::API_DEPLOYMENT).unwrap().property("triggers")
        );
    }

    #[test]
    fn test_content_hash_ignores_stage_settings() {
        let config = StackConfig {
            deployment_trigger: DeploymentTrigger::ContentHash,
            ..StackConfig::default()
        };
        let base = build(&config, fixed_time()).unwrap();
        match base.get(names::API_DEPLOYMENT).unwrap().property("triggers") {
            Some(Property::Map(map)) => assert_eq!(map["content"].len(), 64),
            other => panic!("unexpected triggers {:?}", other),
        }

        let staged = build(
            &StackConfig {
                stage_name: "prod".to_string(),
                ..config.clone()
            },
            fixed_time(),
        )
        .unwrap();
        assert_eq!(
            base.get(names::API_DEPLOYMENT).unwrap().property("triggers"),
            staged.get(names::API_DEPLOYMENT).unwrap().property("triggers")
        );
    }

    #[test]
    fn test_no_trigger_omits_property() {
        let config = StackConfig {
            deployment_trigger: DeploymentTrigger::None,
            ..StackConfig::default()
        };
        let graph = build(&config, fixed_time()).unwrap();
        assert!(graph
            .get(names::API_DEPLOYMENT)
            .unwrap()
            .property("triggers")
            .is_none());
    }

    #[test]
    fn test_permission_source_arn_covers_all_stages_and_methods() {
        let graph = build(&StackConfig::default(), fixed_time()).unwrap();
        let permission = graph.get(names::LAMBDA_PERMISSION).unwrap();
        match permission.property("source_arn") {
            Some(Property::Interpolate {
                prefix,
                reference,
                suffix,
            }) => {
                assert_eq!(prefix, "");
                assert_eq!(reference.resource, names::REST_API);
                assert_eq!(reference.attribute, "execution_arn");
                assert_eq!(suffix, "/*/*/*");
            }
            other => panic!("unexpected source_arn {:?}", other),
        }
    }
}
