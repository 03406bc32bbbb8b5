#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Routing resolution for mesh-enabled services: assembles the transitive
//! resource graph around a target service, validates cross-resource
//! references, and compiles one deterministic, conflict-free routing table
//! (`ComputedRoutes`) per service.

pub mod generate;
pub mod loader;
pub mod pending_status;
pub mod ref_validation;
pub mod reconcile;
pub mod sort;

#[cfg(test)]
mod testutil;

pub use self::{
    generate::{generate_computed_routes, ComputedRoutesResult},
    loader::{load_resources_for_computed_routes, RelatedResources},
    pending_status::PendingStatuses,
    ref_validation::validate_xroute_references,
    reconcile::reconcile_computed_routes,
};
