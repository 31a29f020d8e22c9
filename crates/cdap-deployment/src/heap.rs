//! JVM max-heap sizing
//!
//! CDAP services run on the JVM. Unless the user sets `JAVA_HEAPMAX`
//! themselves, the heap is sized from the container's memory so the JVM does
//! not outgrow its cgroup: the larger of (memory - reserved non-heap) and
//! (memory * minimum heap ratio).

use std::collections::BTreeMap;

use cdap_common::quantity::{self, ParseError};
use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Environment variable read by the CDAP launcher for the max heap flag
pub const JAVA_MAX_HEAP_ENV_VAR: &str = "JAVA_HEAPMAX";

/// Default memory reserved for non-heap JVM usage (768Mi)
pub const DEFAULT_RESERVED_NON_HEAP: u64 = 768 * 1024 * 1024;

/// Default lower bound on heap as a fraction of container memory
pub const DEFAULT_MIN_HEAP_RATIO: f64 = 0.6;

/// Heap sizing tuning constants
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeapSizing {
    /// Bytes left to the JVM outside the heap
    pub reserved_non_heap: u64,
    /// Minimum heap as a fraction of container memory
    pub min_heap_ratio: f64,
}

impl Default for HeapSizing {
    fn default() -> Self {
        Self {
            reserved_non_heap: DEFAULT_RESERVED_NON_HEAP,
            min_heap_ratio: DEFAULT_MIN_HEAP_RATIO,
        }
    }
}

fn memory_of(quantities: Option<&BTreeMap<String, Quantity>>) -> Result<u64, ParseError> {
    match quantities.and_then(|q| q.get("memory")) {
        Some(q) => quantity::parse_memory(&q.0),
        None => Ok(0),
    }
}

impl HeapSizing {
    /// Max heap in bytes for a container with `memory` bytes
    pub fn heap_for(&self, memory: u64) -> u64 {
        let by_reservation = memory.saturating_sub(self.reserved_non_heap);
        let by_ratio = (memory as f64 * self.min_heap_ratio) as u64;
        by_reservation.max(by_ratio)
    }

    /// Append `JAVA_HEAPMAX` to `env` unless it is already set.
    ///
    /// Memory is the larger of the request and the limit. Without either, `env`
    /// is returned unchanged. Existing entries are never reordered.
    pub fn advise(
        &self,
        mut env: Vec<EnvVar>,
        resources: Option<&ResourceRequirements>,
    ) -> Result<Vec<EnvVar>, ParseError> {
        if env.iter().any(|e| e.name == JAVA_MAX_HEAP_ENV_VAR) {
            return Ok(env);
        }

        let requested = memory_of(resources.and_then(|r| r.requests.as_ref()))?;
        let limit = memory_of(resources.and_then(|r| r.limits.as_ref()))?;
        let memory = requested.max(limit);
        if memory == 0 {
            return Ok(env);
        }

        env.push(EnvVar {
            name: JAVA_MAX_HEAP_ENV_VAR.to_string(),
            value: Some(format!("-Xmx{}", self.heap_for(memory))),
            value_from: None,
        });
        Ok(env)
    }
}
