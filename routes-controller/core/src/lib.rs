#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod computed;
pub mod policy;
pub mod reference;
pub mod resource;
pub mod service;
pub mod status;
pub mod store;
pub mod xroute;

pub use self::{
    computed::{BackendTargetDetails, ComputedPortRoutes, ComputedRoutes, NULL_ROUTE_BACKEND},
    reference::{Id, Ref, RefKey, ResourceKind, Stamp, Tenancy, Version},
    resource::{Meta, Payload, Resource},
    service::{Protocol, Service, ServicePort},
    status::{Condition, Status},
    store::{ResourceStore, StoreError},
    xroute::{BackendRef, ParentRef, XRouteRef},
};

/// Status key under which this controller publishes conditions.
pub const ROUTES_CONTROLLER_NAME: &str = "mesh.routes-controller";
