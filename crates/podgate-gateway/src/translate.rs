//! Workload translation.
//!
//! Turns a [`CreateContainerRequest`] with free-form text fields into a
//! [`WorkloadSpecification`], and a specification into a Kubernetes pod.
//!
//! The text parsers are forgiving where the input cannot affect scheduling
//! (malformed environment lines and non-numeric ports are dropped) and strict
//! where it can (a malformed resource quantity fails the whole request).

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Pod, PodSpec, ResourceRequirements,
};
use kube::api::ObjectMeta;
use podgate_core::ResourceName;

use crate::config::GatewayConfig;
use crate::quantity::ResourceQuantity;
use crate::types::{CreateContainerRequest, ResourceRequests, WorkloadSpecification};
use crate::{GatewayError, Result};

/// Label carrying the workload's logical name.
pub const APP_LABEL: &str = "app";
/// Label marking workloads created through the gateway.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Annotation recording when the gateway built the workload.
pub const CREATED_AT_ANNOTATION: &str = "podgate.io/created-at";

const CPU_PREFIX: &str = "cpu:";
const MEMORY_PREFIX: &str = "memory:";

/// Translate a creation request into a workload specification.
///
/// # Errors
///
/// Returns `WorkloadCreationFailed` for illegal names or a missing image,
/// `InvalidResourceSpecification` for malformed quantities and
/// `InvalidCommand` for unbalanced quoting in the command.
pub fn translate(request: &CreateContainerRequest) -> Result<WorkloadSpecification> {
    let rejected = |message: String| GatewayError::WorkloadCreationFailed {
        namespace: request.namespace.clone(),
        name: request.name.clone(),
        message,
        code: None,
    };

    let name = ResourceName::new(request.name.trim())
        .map_err(|e| rejected(format!("invalid name: {e}")))?;
    let namespace = ResourceName::new(request.namespace.trim())
        .map_err(|e| rejected(format!("invalid namespace: {e}")))?;

    let image = request.image.trim();
    if image.is_empty() {
        return Err(rejected("image is required".to_string()));
    }

    Ok(WorkloadSpecification {
        name,
        namespace,
        image: image.to_string(),
        command: parse_command(&request.command)?,
        environment: parse_environment(&request.env),
        ports: parse_ports(&request.ports),
        resources: parse_resources(&request.resources)?,
    })
}

/// Parse one `KEY=VALUE` pair per line.
///
/// Lines are split on the first `=`; key and value are trimmed. Lines without
/// `=` or with an empty key are dropped. A repeated key keeps its last value.
#[must_use]
pub fn parse_environment(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Parse a comma-separated list of container ports, preserving order.
///
/// Tokens that are empty, non-numeric or outside 1..=65535 are dropped.
#[must_use]
pub fn parse_ports(text: &str) -> Vec<u16> {
    text.split(',')
        .filter_map(|token| token.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .collect()
}

/// Parse comma-separated `cpu:<qty>` and `memory:<qty>` requests.
///
/// Prefixes are matched literally and case-sensitively; other tokens are
/// ignored. When a prefix repeats, the first occurrence is used, but every
/// recognized token must still carry a valid quantity.
///
/// # Errors
///
/// Returns `InvalidResourceSpecification` if a recognized token's quantity is
/// malformed or negative.
pub fn parse_resources(text: &str) -> Result<ResourceRequests> {
    let mut requests = ResourceRequests::default();

    for token in text.split(',').map(str::trim) {
        let (slot, raw) = if let Some(raw) = token.strip_prefix(CPU_PREFIX) {
            (&mut requests.cpu, raw)
        } else if let Some(raw) = token.strip_prefix(MEMORY_PREFIX) {
            (&mut requests.memory, raw)
        } else {
            continue;
        };

        let quantity = parse_request_quantity(token, raw.trim())?;
        if slot.is_none() {
            *slot = Some(quantity);
        }
    }

    Ok(requests)
}

fn parse_request_quantity(token: &str, raw: &str) -> Result<ResourceQuantity> {
    let invalid = |reason: String| GatewayError::InvalidResourceSpecification {
        token: token.to_string(),
        reason,
    };

    let quantity: ResourceQuantity = raw.parse().map_err(|e| invalid(format!("{e}")))?;
    if quantity.is_negative() {
        return Err(invalid("requests must not be negative".to_string()));
    }
    Ok(quantity)
}

/// Split a command line with shell quoting rules. Blank input yields no command.
///
/// # Errors
///
/// Returns `InvalidCommand` if the quoting is unbalanced.
pub fn parse_command(text: &str) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    shell_words::split(text).map_err(|e| GatewayError::InvalidCommand(format!("{e}: {text}")))
}

/// Generate the workload name for a container.
#[must_use]
pub fn pod_name_for(name: &str) -> String {
    format!("{name}-pod")
}

/// Build a Kubernetes pod for a workload specification.
///
/// The pod has exactly one container, restart policy `Always`, identity and
/// ownership labels, and resource requests only.
#[must_use]
pub fn build_pod(spec: &WorkloadSpecification, config: &GatewayConfig) -> Pod {
    Pod {
        metadata: build_metadata(spec, config),
        spec: Some(PodSpec {
            containers: vec![build_container(spec)],
            restart_policy: Some("Always".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_metadata(spec: &WorkloadSpecification, config: &GatewayConfig) -> ObjectMeta {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.to_string(), spec.name.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), config.managed_by.clone());

    let mut annotations = BTreeMap::new();
    annotations.insert(
        CREATED_AT_ANNOTATION.to_string(),
        chrono::Utc::now().to_rfc3339(),
    );

    ObjectMeta {
        name: Some(pod_name_for(spec.name.as_str())),
        namespace: Some(spec.namespace.to_string()),
        labels: Some(labels),
        annotations: Some(annotations),
        ..Default::default()
    }
}

fn build_container(spec: &WorkloadSpecification) -> Container {
    Container {
        name: spec.name.to_string(),
        image: Some(spec.image.clone()),
        command: (!spec.command.is_empty()).then(|| spec.command.clone()),
        env: (!spec.environment.is_empty()).then(|| build_env_vars(&spec.environment)),
        ports: (!spec.ports.is_empty()).then(|| build_ports(&spec.ports)),
        resources: Some(build_resources(&spec.resources)),
        ..Default::default()
    }
}

fn build_env_vars(environment: &BTreeMap<String, String>) -> Vec<EnvVar> {
    environment
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect()
}

fn build_ports(ports: &[u16]) -> Vec<ContainerPort> {
    ports
        .iter()
        .map(|port| ContainerPort {
            container_port: i32::from(*port),
            ..Default::default()
        })
        .collect()
}

fn build_resources(resources: &ResourceRequests) -> ResourceRequirements {
    let mut requests = BTreeMap::new();
    if let Some(cpu) = &resources.cpu {
        requests.insert("cpu".to_string(), cpu.clone().into());
    }
    if let Some(memory) = &resources.memory {
        requests.insert("memory".to_string(), memory.clone().into());
    }

    ResourceRequirements {
        requests: Some(requests),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    fn request() -> CreateContainerRequest {
        CreateContainerRequest {
            name: "web".to_string(),
            namespace: "apps".to_string(),
            image: "nginx:1.27".to_string(),
            command: String::new(),
            ports: "80, 443".to_string(),
            env: "MODE=prod\nLOG_LEVEL = debug".to_string(),
            resources: "cpu:500m, memory:256Mi".to_string(),
        }
    }

    #[test]
    fn environment_drops_lines_without_equals() {
        let env = parse_environment("A=1\nBAD\nB = 2");
        assert_eq!(env.len(), 2);
        assert_eq!(env["A"], "1");
        assert_eq!(env["B"], "2");
    }

    #[test]
    fn environment_splits_on_first_equals_only() {
        let env = parse_environment("URL=postgres://u:p@h/db?ssl=true\r\n=orphan\n\n");
        assert_eq!(env.len(), 1);
        assert_eq!(env["URL"], "postgres://u:p@h/db?ssl=true");
    }

    #[test]
    fn ports_drop_non_numeric_and_keep_order() {
        assert_eq!(parse_ports("80, foo, 443"), vec![80, 443]);
        assert_eq!(parse_ports("8443,,80"), vec![8443, 80]);
        assert_eq!(parse_ports("0, 70000, -1, 22"), vec![22]);
        assert!(parse_ports("").is_empty());
    }

    #[test]
    fn resources_parse_requests() {
        let requests = parse_resources("cpu:500m, memory: 256Mi").unwrap();
        assert_eq!(requests.cpu.as_ref().map(ResourceQuantity::as_str), Some("500m"));
        assert_eq!(requests.memory.as_ref().map(ResourceQuantity::as_str), Some("256Mi"));
    }

    #[test]
    fn resources_reject_bad_quantity() {
        let err = parse_resources("cpu:bogus").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResourceSpecification);

        let err = parse_resources("memory:-1Gi").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResourceSpecification);

        let err = parse_resources("cpu:").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResourceSpecification);
    }

    #[test]
    fn resources_ignore_unrecognized_prefixes() {
        let requests = parse_resources("gpu:1").unwrap();
        assert!(requests.is_empty());

        let requests = parse_resources("CPU:1, storage:10Gi").unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    fn resources_first_match_wins() {
        let requests = parse_resources("cpu:250m, cpu:1").unwrap();
        assert_eq!(requests.cpu.unwrap().as_str(), "250m");
    }

    #[test]
    fn empty_text_fields_yield_empty_collections() {
        let mut req = request();
        req.env.clear();
        req.ports.clear();
        req.resources.clear();

        let spec = translate(&req).unwrap();
        assert!(spec.environment.is_empty());
        assert!(spec.ports.is_empty());
        assert!(spec.resources.is_empty());
        assert!(spec.command.is_empty());
    }

    #[test]
    fn command_uses_shell_quoting() {
        assert_eq!(
            parse_command(r#"sh -c "echo hello && sleep 3600""#).unwrap(),
            vec!["sh", "-c", "echo hello && sleep 3600"]
        );
        let err = parse_command("sh -c 'unterminated").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);
    }

    #[test]
    fn translate_rejects_illegal_names_and_missing_image() {
        let mut req = request();
        req.name = "Web_App".to_string();
        assert_eq!(
            translate(&req).unwrap_err().kind(),
            ErrorKind::WorkloadCreationFailed
        );

        let mut req = request();
        req.image = "  ".to_string();
        assert_eq!(
            translate(&req).unwrap_err().kind(),
            ErrorKind::WorkloadCreationFailed
        );
    }

    #[test]
    fn build_pod_has_required_fields() {
        let spec = translate(&request()).unwrap();
        let config = GatewayConfig::default();
        let pod = build_pod(&spec, &config);

        let meta = &pod.metadata;
        assert_eq!(meta.name.as_deref(), Some("web-pod"));
        assert_eq!(meta.namespace.as_deref(), Some("apps"));
        let labels = meta.labels.as_ref().unwrap();
        assert_eq!(labels.get(APP_LABEL).map(String::as_str), Some("web"));
        assert_eq!(labels.get(MANAGED_BY_LABEL).map(String::as_str), Some("podgate"));
        assert!(meta
            .annotations
            .as_ref()
            .unwrap()
            .contains_key(CREATED_AT_ANNOTATION));

        let pod_spec = pod.spec.as_ref().unwrap();
        assert_eq!(pod_spec.restart_policy.as_deref(), Some("Always"));
        assert_eq!(pod_spec.containers.len(), 1);

        let container = &pod_spec.containers[0];
        assert_eq!(container.name, "web");
        assert_eq!(container.image.as_deref(), Some("nginx:1.27"));
        assert!(container.command.is_none());

        let env = container.env.as_ref().unwrap();
        let env_names: Vec<_> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(env_names, vec!["LOG_LEVEL", "MODE"]);

        let ports: Vec<_> = container
            .ports
            .as_ref()
            .unwrap()
            .iter()
            .map(|p| p.container_port)
            .collect();
        assert_eq!(ports, vec![80, 443]);
    }

    #[test]
    fn build_pod_sets_requests_only() {
        let spec = translate(&request()).unwrap();
        let pod = build_pod(&spec, &GatewayConfig::default());
        let container = &pod.spec.as_ref().unwrap().containers[0];
        let resources = container.resources.as_ref().unwrap();

        let requests = resources.requests.as_ref().unwrap();
        assert_eq!(requests.get("cpu"), Some(&Quantity("500m".to_string())));
        assert_eq!(requests.get("memory"), Some(&Quantity("256Mi".to_string())));
        assert!(resources.limits.is_none());
    }

    #[test]
    fn build_pod_without_resources_has_empty_request_map() {
        let mut req = request();
        req.resources.clear();
        let spec = translate(&req).unwrap();
        let pod = build_pod(&spec, &GatewayConfig::default());
        let container = &pod.spec.as_ref().unwrap().containers[0];

        let requests = container.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert!(requests.is_empty());
    }
}
