//! Placement and workload spec building for CDAP
//!
//! This crate turns a CDAPMaster into the specs of the objects that run it:
//!
//! - **Strategy**: pod count to a partition of the service catalog into groups
//! - **Reconcile**: agreement on pod-level fields across a group
//! - **Heap**: JVM max-heap sizing from container memory
//! - **Builder**: expands every group into StatefulSet, Deployment and Service specs

#![deny(missing_docs)]

pub mod builder;
pub mod error;
pub mod heap;
pub mod reconcile;
pub mod spec;
pub mod strategy;

pub use builder::SpecBuilder;
pub use error::BuildError;
pub use heap::HeapSizing;
pub use reconcile::{FieldValue, ReconcileError, ServiceField};
pub use spec::{
    ContainerSpec, DeploymentSpec, DeploymentSpecBundle, NetworkServiceSpec, StatefulSpec,
    WorkloadSpec,
};
pub use strategy::{Partition, ServiceGroup, StrategyError, StrategyTable};
