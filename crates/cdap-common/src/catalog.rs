//! The fixed CDAP service catalog
//!
//! Every CDAPMaster runs the same eight services. A placement strategy decides
//! how they are co-located, but never adds or removes one. Each service has a
//! configuration shape that determines which per-service fields exist on its
//! CRD sub-object.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Prefix shared by every CDAP master entrypoint class
const MAIN_CLASS_PREFIX: &str = "io.cdap.cdap.master.environment.k8s.";

/// Entrypoint of the storage initialization container
pub const STORAGE_INIT_MAIN: &str = "io.cdap.cdap.master.environment.k8s.StorageMain";

/// Container name of the storage initialization container
pub const STORAGE_INIT_CONTAINER: &str = "storageinit";

/// Error returned when a string does not name a catalog service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown CDAP service: {0}")]
pub struct UnknownServiceError(pub String);

/// A service from the fixed CDAP catalog.
///
/// Identity is the CamelCase name, which appears verbatim in selector label keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceName {
    /// Application lifecycle and program runtime
    AppFabric,
    /// Log collection and indexing
    Logs,
    /// Transactional messaging
    Messaging,
    /// Metadata and lineage
    Metadata,
    /// Metrics collection and query
    Metrics,
    /// Pipeline preview runner
    Preview,
    /// HTTP gateway in front of every other service
    Router,
    /// Node.js web UI
    UserInterface,
}

/// Which optional fields a service's configuration sub-object carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceShape {
    /// Common fields only
    Plain,
    /// Common fields plus persistent storage size and class
    Stateful,
    /// Common fields plus an externally exposed service type and port
    External,
}

impl ServiceName {
    /// Every service in the catalog, in name order
    pub const ALL: [ServiceName; 8] = [
        ServiceName::AppFabric,
        ServiceName::Logs,
        ServiceName::Messaging,
        ServiceName::Metadata,
        ServiceName::Metrics,
        ServiceName::Preview,
        ServiceName::Router,
        ServiceName::UserInterface,
    ];

    /// The CamelCase identity of this service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppFabric => "AppFabric",
            Self::Logs => "Logs",
            Self::Messaging => "Messaging",
            Self::Metadata => "Metadata",
            Self::Metrics => "Metrics",
            Self::Preview => "Preview",
            Self::Router => "Router",
            Self::UserInterface => "UserInterface",
        }
    }

    /// Configuration shape of this service's CRD sub-object
    pub fn shape(&self) -> ServiceShape {
        match self {
            Self::Logs | Self::Messaging | Self::Metrics | Self::Preview => ServiceShape::Stateful,
            Self::Router | Self::UserInterface => ServiceShape::External,
            Self::AppFabric | Self::Metadata => ServiceShape::Plain,
        }
    }

    /// Container name used for this service inside a pod
    pub fn container_name(&self) -> String {
        self.as_str().to_lowercase()
    }

    /// Fully qualified entrypoint class passed as the container argument
    pub fn main_class(&self) -> String {
        format!("{}{}ServiceMain", MAIN_CLASS_PREFIX, self.as_str())
    }

    /// Port the service listens on, for services that are exposed
    pub fn exposed_port(&self) -> Option<i32> {
        match self {
            Self::Router => Some(11015),
            Self::UserInterface => Some(11011),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = UnknownServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| UnknownServiceError(s.to_string()))
    }
}
