//! CDAP operator - places the CDAP service catalog onto Kubernetes
//!
//! A `CDAPMaster` resource describes one CDAP instance. Its fixed set of
//! services is split across StatefulSets and Deployments according to the
//! requested pod count, and the Router and UI are exposed through Services.
//!
//! # Modules
//!
//! - [`cdap_common`] - CDAPMaster CRD, service catalog, size codec, errors, telemetry
//! - [`cdap_deployment`] - Placement strategies and the spec builder
//! - [`render`] - Template rendering of specs into typed Kubernetes objects

#![deny(missing_docs)]

pub mod render;

use std::collections::BTreeMap;

pub use cdap_common::{crd, Error, Result};
pub use cdap_deployment::{DeploymentSpecBundle, SpecBuilder};
pub use render::{ManifestRenderer, RenderError, RenderedObject};

use cdap_common::crd::CDAPMaster;

/// Build and render every object for `master`.
///
/// Errors are attributed to the CDAPMaster by name. An empty list means the
/// master's images are not resolved yet.
pub fn generate_manifests(
    builder: &SpecBuilder<'_>,
    renderer: &ManifestRenderer,
    master: &CDAPMaster,
    labels: &BTreeMap<String, String>,
) -> Result<Vec<RenderedObject>> {
    let app = master.metadata.name.as_deref().unwrap_or_default();
    let bundle = builder
        .build(master, labels)
        .map_err(|e| e.into_error(app))?;
    Ok(renderer.render_bundle(&bundle)?)
}
