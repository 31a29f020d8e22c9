//! Manifest rendering
//!
//! Each spec from the bundle is rendered through an embedded YAML template and
//! parsed back into the typed `k8s-openapi` object, so a template that drifts
//! from the API schema fails here rather than at apply time.
//!
//! Templates receive the spec as `spec`. Values are emitted with `tojson`,
//! which YAML reads as flow scalars and collections.

mod error;

pub use error::RenderError;

use cdap_deployment::{DeploymentSpec, DeploymentSpecBundle, NetworkServiceSpec, StatefulSpec};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Service;
use minijinja::{context, Environment, UndefinedBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub(crate) const STATEFULSET_TEMPLATE: &str = "statefulset";
pub(crate) const DEPLOYMENT_TEMPLATE: &str = "deployment";
pub(crate) const SERVICE_TEMPLATE: &str = "service";

const TEMPLATES: [(&str, &str); 5] = [
    (STATEFULSET_TEMPLATE, include_str!("../../templates/statefulset.yaml")),
    (DEPLOYMENT_TEMPLATE, include_str!("../../templates/deployment.yaml")),
    (SERVICE_TEMPLATE, include_str!("../../templates/service.yaml")),
    ("pod", include_str!("../../templates/pod.yaml")),
    ("container", include_str!("../../templates/container.yaml")),
];

/// A rendered platform object
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderedObject {
    /// From a stateful group
    StatefulSet(Box<StatefulSet>),
    /// From a stateless group
    Deployment(Box<Deployment>),
    /// From a network service
    Service(Box<Service>),
}

impl RenderedObject {
    /// Kubernetes kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatefulSet(_) => "StatefulSet",
            Self::Deployment(_) => "Deployment",
            Self::Service(_) => "Service",
        }
    }

    /// Object name
    pub fn name(&self) -> Option<&str> {
        let meta = match self {
            Self::StatefulSet(o) => &o.metadata,
            Self::Deployment(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
        };
        meta.name.as_deref()
    }
}

/// Renders spec bundles with the embedded templates
pub struct ManifestRenderer {
    env: Environment<'static>,
}

impl Default for ManifestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestRenderer {
    /// Create a renderer with the embedded templates loaded
    ///
    /// # Panics
    ///
    /// Panics if an embedded template fails to parse. Templates are compiled
    /// into the binary, so this is caught by the unit tests.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .expect("embedded manifest templates are valid");
        }
        Self { env }
    }

    /// Render a StatefulSet
    pub fn stateful_set(&self, spec: &StatefulSpec) -> Result<StatefulSet, RenderError> {
        self.render(STATEFULSET_TEMPLATE, "StatefulSet", &spec.workload.name, spec)
    }

    /// Render a Deployment
    pub fn deployment(&self, spec: &DeploymentSpec) -> Result<Deployment, RenderError> {
        self.render(DEPLOYMENT_TEMPLATE, "Deployment", &spec.workload.name, spec)
    }

    /// Render a Service
    pub fn service(&self, spec: &NetworkServiceSpec) -> Result<Service, RenderError> {
        self.render(SERVICE_TEMPLATE, "Service", &spec.name, spec)
    }

    /// Render every object of `bundle`: StatefulSets, then Deployments, then Services.
    ///
    /// Fails on the first object that does not render; nothing is returned
    /// for the rest.
    pub fn render_bundle(
        &self,
        bundle: &DeploymentSpecBundle,
    ) -> Result<Vec<RenderedObject>, RenderError> {
        let mut objects = Vec::with_capacity(bundle.len());
        for spec in &bundle.stateful {
            objects.push(RenderedObject::StatefulSet(Box::new(self.stateful_set(spec)?)));
        }
        for spec in &bundle.deployments {
            objects.push(RenderedObject::Deployment(Box::new(self.deployment(spec)?)));
        }
        for spec in &bundle.network_services {
            objects.push(RenderedObject::Service(Box::new(self.service(spec)?)));
        }
        Ok(objects)
    }

    /// Render `template` with `spec` to YAML text
    pub fn render_yaml<S: Serialize>(
        &self,
        template: &'static str,
        object: &str,
        spec: &S,
    ) -> Result<String, RenderError> {
        let to_error = |source| RenderError::Template {
            template,
            object: object.to_string(),
            source,
        };
        self.env
            .get_template(template)
            .map_err(to_error)?
            .render(context! { spec => spec })
            .map_err(to_error)
    }

    fn render<S: Serialize, T: DeserializeOwned>(
        &self,
        template: &'static str,
        kind: &'static str,
        object: &str,
        spec: &S,
    ) -> Result<T, RenderError> {
        let yaml = self.render_yaml(template, object, spec)?;
        debug!(kind, object, "rendered manifest");
        serde_yaml::from_str(&yaml).map_err(|source| RenderError::Parse {
            kind,
            object: object.to_string(),
            source,
        })
    }
}
