//! Custom Resource Definitions for the CDAP operator

mod master;

pub use master::{
    CDAPMaster, CDAPMasterSpec, CDAPMasterStatus, ExternalServiceSpec, ResolvedImages,
    ServiceConfig, ServiceSpec, StatefulServiceSpec,
};
