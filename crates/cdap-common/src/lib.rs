//! Common types for the CDAP operator: CRDs, the service catalog, errors, and utilities

#![deny(missing_docs)]

pub mod catalog;
pub mod crd;
pub mod error;
pub mod quantity;
pub mod telemetry;

pub use catalog::{ServiceName, ServiceShape};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Naming and Label Constants
// =============================================================================
// Object names and selector labels are consumed by the rendered manifests and by
// Services selecting pods across strategy changes, so they must stay stable.

/// Prefix of the per-service pod label (`cdap.container.<Service>` = `<app name>`)
///
/// Every workload carries one such label per service it runs, which lets a
/// Service select the owning pod regardless of how services are grouped.
pub const LABEL_CONTAINER_KEY_PREFIX: &str = "cdap.container.";

/// Label key identifying the CDAPMaster instance owning an object
pub const LABEL_INSTANCE: &str = "cdap.instance";

/// Standard Kubernetes managed-by label key
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Managed-by label value for objects produced by this operator
pub const LABEL_MANAGED_BY_CDAP: &str = "cdap-operator";

/// Suffix of the ConfigMap holding cdap-site.xml entries
pub const CONFIG_MAP_CCONF: &str = "cconf";

/// Suffix of the ConfigMap holding Hadoop configuration
pub const CONFIG_MAP_HCONF: &str = "hconf";

/// Local data directory mounted into every CDAP container
pub const LOCAL_DATA_DIR: &str = "/data";

/// Build the name of an object owned by a CDAPMaster.
///
/// The format `<app>-<suffix>` is relied upon by existing clusters; changing it
/// orphans live objects.
pub fn object_name(app: &str, suffix: &str) -> String {
    format!("{}-{}", app, suffix)
}

/// Build the per-service selector label key for `service`.
pub fn container_label_key(service: ServiceName) -> String {
    format!("{}{}", LABEL_CONTAINER_KEY_PREFIX, service)
}
