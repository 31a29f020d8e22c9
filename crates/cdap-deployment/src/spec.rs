//! Workload spec value types
//!
//! These are the builder's output: plain values describing what each
//! StatefulSet, Deployment and Service should contain. They serialize in
//! camelCase and are the context handed to the manifest templates, so field
//! names here are part of the template contract.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use serde::Serialize;

// =============================================================================
// Containers
// =============================================================================

/// One container of a workload pod
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Container name (lowercase service name)
    pub name: String,
    /// Image reference
    pub image: String,
    /// Image pull policy, cluster default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    /// Working directory override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Entrypoint override
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Arguments
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment, including the derived heap flag
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Resource requests and limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Local data directory mount path
    pub data_dir: String,
}

impl ContainerSpec {
    /// Create a container running `image` with `data_dir` mounted
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        data_dir: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the image pull policy
    pub fn with_image_pull_policy(mut self, policy: Option<String>) -> Self {
        self.image_pull_policy = policy;
        self
    }

    /// Replace the image
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Replace the entrypoint
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the environment
    pub fn with_env(mut self, env: Vec<EnvVar>) -> Self {
        self.env = env;
        self
    }

    /// Append one literal environment variable
    pub fn add_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        });
        self
    }

    /// Set resources
    pub fn with_resources(mut self, resources: Option<ResourceRequirements>) -> Self {
        self.resources = resources;
        self
    }
}

// =============================================================================
// Workloads
// =============================================================================

/// Pod-level settings shared by StatefulSets and Deployments
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Object name, `<app>-<group>`
    pub name: String,
    /// Namespace of the owning CDAPMaster
    pub namespace: String,
    /// Labels on the workload and its pod template
    pub labels: BTreeMap<String, String>,
    /// Pod selector; a subset of `labels`
    pub selector: BTreeMap<String, String>,
    /// Replica count
    pub replicas: i32,
    /// Reconciled service account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// Reconciled runtime class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_class_name: Option<String>,
    /// Reconciled priority class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
    /// Reconciled node selector
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    /// cConf ConfigMap name
    pub cconf: String,
    /// hConf ConfigMap name
    pub hconf: String,
    /// Local data directory
    pub data_dir: String,
    /// One container per service in the group
    pub containers: Vec<ContainerSpec>,
}

impl WorkloadSpec {
    /// Add a label to the workload and its pod selector
    pub fn add_selector_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.selector.insert(key.clone(), value.clone());
        self.labels.insert(key, value);
    }
}

/// A stateful group, rendered as a StatefulSet
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulSpec {
    /// Pod-level settings
    #[serde(flatten)]
    pub workload: WorkloadSpec,
    /// Containers run to completion before the service containers
    pub init_containers: Vec<ContainerSpec>,
    /// Total storage across the group, absent when no service declares any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<String>,
    /// Storage class shared by the group, unused without `storage_size`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

/// A stateless group, rendered as a Deployment
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Pod-level settings
    #[serde(flatten)]
    pub workload: WorkloadSpec,
}

// =============================================================================
// Network Services
// =============================================================================

/// An exposed service, rendered as a Kubernetes Service
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkServiceSpec {
    /// Object name, `<app>-<network service name>`
    pub name: String,
    /// Namespace of the owning CDAPMaster
    pub namespace: String,
    /// Labels on the Service
    pub labels: BTreeMap<String, String>,
    /// Service type (ClusterIP, NodePort, LoadBalancer)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    /// Externally visible port, target port when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,
    /// Container port traffic is sent to
    pub target_port: i32,
    /// Selects the pod running the target service
    pub selector: BTreeMap<String, String>,
}

// =============================================================================
// Bundle
// =============================================================================

/// Everything one CDAPMaster expands to
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpecBundle {
    /// StatefulSets, in group name order
    pub stateful: Vec<StatefulSpec>,
    /// Deployments, in group name order
    pub deployments: Vec<DeploymentSpec>,
    /// Services, in name order
    pub network_services: Vec<NetworkServiceSpec>,
}

impl DeploymentSpecBundle {
    /// True when the bundle describes no objects
    pub fn is_empty(&self) -> bool {
        self.stateful.is_empty() && self.deployments.is_empty() && self.network_services.is_empty()
    }

    /// Number of objects described
    pub fn len(&self) -> usize {
        self.stateful.len() + self.deployments.len() + self.network_services.len()
    }
}
