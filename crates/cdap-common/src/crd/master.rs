//! CDAPMaster Custom Resource Definition
//!
//! A CDAPMaster describes one CDAP instance. The top-level spec carries the
//! images and the placement granularity (`numPods`); each catalog service has
//! its own sub-object whose shape depends on the service (see
//! [`ServiceShape`](crate::ServiceShape)).
//!
//! Schema validation and defaulting of these fields happen in the API server;
//! the operator only reads them.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::ServiceName;

/// Specification for a CDAPMaster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cdap.cdap.io",
    version = "v1alpha1",
    kind = "CDAPMaster",
    plural = "cdapmasters",
    namespaced,
    status = "CDAPMasterStatus",
    printcolumn = r#"{"name":"Pods","type":"integer","jsonPath":".spec.numPods"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".status.imageToUse"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CDAPMasterSpec {
    /// Container image for the CDAP master services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Container image for the UserInterface service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_interface_image: Option<String>,

    /// Placement granularity. 0 runs every service in its own pod; higher
    /// values co-locate services into fewer pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_pods: Option<i32>,

    /// Default service account for every workload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Image pull policy applied to every container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// cdap-site.xml entries, read by whatever owns the cConf ConfigMap
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,

    /// AppFabric service configuration
    #[serde(default)]
    pub app_fabric: ServiceSpec,

    /// Logs service configuration
    #[serde(default)]
    pub logs: StatefulServiceSpec,

    /// Messaging service configuration
    #[serde(default)]
    pub messaging: StatefulServiceSpec,

    /// Metadata service configuration
    #[serde(default)]
    pub metadata: ServiceSpec,

    /// Metrics service configuration
    #[serde(default)]
    pub metrics: StatefulServiceSpec,

    /// Preview service configuration
    #[serde(default)]
    pub preview: StatefulServiceSpec,

    /// Router service configuration
    #[serde(default)]
    pub router: ExternalServiceSpec,

    /// UserInterface service configuration
    #[serde(default)]
    pub user_interface: ExternalServiceSpec,
}

/// Fields shared by every service sub-object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Service account for the pod running this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Runtime class for the pod running this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_class_name: Option<String>,

    /// Priority class for the pod running this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,

    /// Node selector for the pod running this service
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Container resource requests and limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Extra container environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// Sub-object of a service that owns persistent storage
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatefulServiceSpec {
    /// Common service fields
    #[serde(flatten)]
    pub service: ServiceSpec,

    /// Persistent volume size (e.g. "100Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<String>,

    /// Storage class of the persistent volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

/// Sub-object of a service exposed outside the pod network
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalServiceSpec {
    /// Common service fields
    #[serde(flatten)]
    pub service: ServiceSpec,

    /// Kubernetes Service type (ClusterIP, NodePort, LoadBalancer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    /// Externally visible port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,
}

/// Status for a CDAPMaster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CDAPMasterStatus {
    /// Image chosen by the version update handler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_to_use: Option<String>,

    /// UserInterface image chosen by the version update handler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_interface_image_to_use: Option<String>,
}

/// Image references resolved by the version update handler
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedImages {
    /// Image for every service except UserInterface
    pub image: String,
    /// Image for UserInterface
    pub user_interface_image: String,
}

/// Borrowed view of one service's sub-object, tagged by its shape
#[derive(Clone, Copy, Debug)]
pub enum ServiceConfig<'a> {
    /// Common fields only
    Plain(&'a ServiceSpec),
    /// Service with persistent storage
    Stateful(&'a StatefulServiceSpec),
    /// Externally exposed service
    External(&'a ExternalServiceSpec),
}

impl<'a> ServiceConfig<'a> {
    /// Fields shared by every shape
    pub fn common(self) -> &'a ServiceSpec {
        match self {
            Self::Plain(spec) => spec,
            Self::Stateful(spec) => &spec.service,
            Self::External(spec) => &spec.service,
        }
    }
}

impl CDAPMasterSpec {
    /// Look up the sub-object configuring `service`
    pub fn service(&self, service: ServiceName) -> ServiceConfig<'_> {
        match service {
            ServiceName::AppFabric => ServiceConfig::Plain(&self.app_fabric),
            ServiceName::Metadata => ServiceConfig::Plain(&self.metadata),
            ServiceName::Logs => ServiceConfig::Stateful(&self.logs),
            ServiceName::Messaging => ServiceConfig::Stateful(&self.messaging),
            ServiceName::Metrics => ServiceConfig::Stateful(&self.metrics),
            ServiceName::Preview => ServiceConfig::Stateful(&self.preview),
            ServiceName::Router => ServiceConfig::External(&self.router),
            ServiceName::UserInterface => ServiceConfig::External(&self.user_interface),
        }
    }

    /// Placement granularity, defaulting to one service per pod
    pub fn num_pods(&self) -> i32 {
        self.num_pods.unwrap_or(0)
    }
}

impl CDAPMaster {
    /// Both resolved images, or None until the version update handler has set them
    pub fn resolved_images(&self) -> Option<ResolvedImages> {
        let status = self.status.as_ref()?;
        let image = status.image_to_use.as_deref().filter(|s| !s.is_empty())?;
        let ui = status
            .user_interface_image_to_use
            .as_deref()
            .filter(|s| !s.is_empty())?;
        Some(ResolvedImages {
            image: image.to_string(),
            user_interface_image: ui.to_string(),
        })
    }
}
