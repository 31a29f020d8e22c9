//! Placement strategies
//!
//! A placement strategy maps a pod count to a partition of the service catalog
//! into co-located groups. Stateful groups become StatefulSets (persistent
//! identity and storage), stateless groups become Deployments. Each strategy
//! also names the Services exposing Router and UserInterface.
//!
//! The table is fixed: it is built and validated once, then shared read-only
//! across every reconcile pass.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use cdap_common::{ServiceName, ServiceShape};
use thiserror::Error;

use ServiceName::*;

/// Errors resolving or registering a placement strategy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// No strategy is registered for the requested pod count
    #[error("unsupported deployment strategy for numPods {num_pods}")]
    NotSupported {
        /// The requested pod count
        num_pods: i32,
    },

    /// A partition does not cover the catalog exactly once, or is otherwise malformed
    #[error("invalid partition for numPods {num_pods}: {message}")]
    InvalidPartition {
        /// Pod count the partition was registered for
        num_pods: i32,
        /// What is wrong with it
        message: String,
    },
}

/// A named set of services co-located in one pod
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceGroup {
    /// Group name, unique within its kind; suffix of the workload object name
    pub name: String,
    /// Services in container order
    pub services: Vec<ServiceName>,
}

/// One strategy's split of the catalog into workloads and exposed Services
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    stateful: Vec<ServiceGroup>,
    stateless: Vec<ServiceGroup>,
    network_services: BTreeMap<String, ServiceName>,
}

impl Partition {
    /// Create an empty partition
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group run as a StatefulSet
    pub fn with_stateful(mut self, name: &str, services: &[ServiceName]) -> Self {
        self.stateful.push(ServiceGroup {
            name: name.to_string(),
            services: services.to_vec(),
        });
        self
    }

    /// Add a group run as a Deployment
    pub fn with_stateless(mut self, name: &str, services: &[ServiceName]) -> Self {
        self.stateless.push(ServiceGroup {
            name: name.to_string(),
            services: services.to_vec(),
        });
        self
    }

    /// Expose `target` through a Service named `name`
    pub fn with_network_service(mut self, name: &str, target: ServiceName) -> Self {
        self.network_services.insert(name.to_string(), target);
        self
    }

    /// Groups run as StatefulSets, in name order
    pub fn stateful(&self) -> &[ServiceGroup] {
        &self.stateful
    }

    /// Groups run as Deployments, in name order
    pub fn stateless(&self) -> &[ServiceGroup] {
        &self.stateless
    }

    /// Exposed Services, keyed by Service name
    pub fn network_services(&self) -> &BTreeMap<String, ServiceName> {
        &self.network_services
    }

    /// Every group of either kind
    pub fn groups(&self) -> impl Iterator<Item = &ServiceGroup> {
        self.stateful.iter().chain(self.stateless.iter())
    }

    /// Check catalog coverage and naming, then sort groups by name.
    fn validate(mut self, num_pods: i32) -> Result<Self, StrategyError> {
        let invalid = |message: String| StrategyError::InvalidPartition { num_pods, message };

        for groups in [&mut self.stateful, &mut self.stateless] {
            groups.sort_by(|a, b| a.name.cmp(&b.name));
            if let Some(pair) = groups.windows(2).find(|w| w[0].name == w[1].name) {
                return Err(invalid(format!("duplicate group name '{}'", pair[0].name)));
            }
            if let Some(group) = groups
                .iter()
                .find(|g| g.name.is_empty() || g.services.is_empty())
            {
                return Err(invalid(format!(
                    "group '{}' must have a name and at least one service",
                    group.name
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for service in self.groups().flat_map(|g| g.services.iter()) {
            if !seen.insert(*service) {
                return Err(invalid(format!("service {} placed more than once", service)));
            }
        }
        let missing: Vec<&str> = ServiceName::ALL
            .iter()
            .filter(|s| !seen.contains(*s))
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!("services not placed: {}", missing.join(", "))));
        }

        if let Some((name, target)) = self
            .network_services
            .iter()
            .find(|(_, target)| target.shape() != ServiceShape::External)
        {
            return Err(invalid(format!(
                "network service '{}' targets {} which is not externally exposable",
                name, target
            )));
        }

        Ok(self)
    }
}

/// Immutable lookup from pod count to partition
#[derive(Clone, Debug, Default)]
pub struct StrategyTable {
    strategies: BTreeMap<i32, Partition>,
}

impl StrategyTable {
    /// Build the table of supported strategies.
    ///
    /// - 0: every service in its own pod
    /// - 1: every service in one pod
    /// - 2: UserInterface alone, everything else in "backend"
    /// - 3: UserInterface and Router alone, everything else in "backend"
    ///
    /// # Panics
    ///
    /// Panics if a hard-coded partition fails validation. The partitions are
    /// constants, so this indicates a programming error caught by the unit tests.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (num_pods, partition) in builtin_partitions() {
            table
                .register(num_pods, partition)
                .expect("built-in placement strategies are valid");
        }
        table
    }

    /// Process-wide table, built on first use
    pub fn shared() -> &'static StrategyTable {
        static TABLE: OnceLock<StrategyTable> = OnceLock::new();
        TABLE.get_or_init(StrategyTable::builtin)
    }

    fn register(&mut self, num_pods: i32, partition: Partition) -> Result<(), StrategyError> {
        if self.strategies.contains_key(&num_pods) {
            return Err(StrategyError::InvalidPartition {
                num_pods,
                message: "strategy already registered".to_string(),
            });
        }
        let partition = partition.validate(num_pods)?;
        self.strategies.insert(num_pods, partition);
        Ok(())
    }

    /// Look up the partition for `num_pods`
    pub fn resolve(&self, num_pods: i32) -> Result<&Partition, StrategyError> {
        self.strategies
            .get(&num_pods)
            .ok_or(StrategyError::NotSupported { num_pods })
    }

    /// Supported pod counts, ascending
    pub fn supported_pod_counts(&self) -> impl Iterator<Item = i32> + '_ {
        self.strategies.keys().copied()
    }
}

fn with_exposed_services(partition: Partition) -> Partition {
    partition
        .with_network_service("router", Router)
        .with_network_service("userinterface", UserInterface)
}

fn builtin_partitions() -> Vec<(i32, Partition)> {
    vec![
        (
            0,
            with_exposed_services(
                Partition::new()
                    .with_stateful("logs", &[Logs])
                    .with_stateful("messaging", &[Messaging])
                    .with_stateful("metrics", &[Metrics])
                    .with_stateful("preview", &[Preview])
                    .with_stateless("appfabric", &[AppFabric])
                    .with_stateless("metadata", &[Metadata])
                    .with_stateless("router", &[Router])
                    .with_stateless("userinterface", &[UserInterface]),
            ),
        ),
        (
            1,
            with_exposed_services(Partition::new().with_stateful(
                "standalone",
                &[
                    Logs,
                    Messaging,
                    Metrics,
                    Preview,
                    AppFabric,
                    Metadata,
                    Router,
                    UserInterface,
                ],
            )),
        ),
        (
            2,
            with_exposed_services(
                Partition::new()
                    .with_stateful(
                        "backend",
                        &[Logs, Messaging, Metrics, Preview, AppFabric, Metadata, Router],
                    )
                    .with_stateless("userinterface", &[UserInterface]),
            ),
        ),
        (
            3,
            with_exposed_services(
                Partition::new()
                    .with_stateful(
                        "backend",
                        &[Logs, Messaging, Metrics, Preview, AppFabric, Metadata],
                    )
                    .with_stateless("router", &[Router])
                    .with_stateless("userinterface", &[UserInterface]),
            ),
        ),
    ]
}
