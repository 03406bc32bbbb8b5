use crate::{
    policy::{DestinationConfig, FailoverConfig},
    reference::{RefKey, ResourceKind},
    service::{Protocol, Service},
    xroute::{
        BackendRef, GrpcRouteMatch, HttpRouteMatch, ParentRef, RouteFilter, RouteRetries,
        RouteTimeouts,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The reserved target key meaning "discard traffic". Never present in a
/// port's `targets` map.
pub const NULL_ROUTE_BACKEND: &str = "null-route-backend";

/// The key under which a resolved backend is registered in a port's
/// `targets` map.
pub fn backend_target_key(service: &RefKey, port: &str) -> String {
    format!("{}/{}/{}?port={}", service.kind, service.tenancy, service.name, port)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedBackendRef {
    pub backend_target: String,
    pub weight: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedHttpRouteRule {
    pub matches: Vec<HttpRouteMatch>,
    pub filters: Vec<RouteFilter>,
    pub backend_refs: Vec<ComputedBackendRef>,
    pub timeouts: Option<RouteTimeouts>,
    pub retries: Option<RouteRetries>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedHttpRoute {
    pub rules: Vec<ComputedHttpRouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedGrpcRouteRule {
    pub matches: Vec<GrpcRouteMatch>,
    pub filters: Vec<RouteFilter>,
    pub backend_refs: Vec<ComputedBackendRef>,
    pub timeouts: Option<RouteTimeouts>,
    pub retries: Option<RouteRetries>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedGrpcRoute {
    pub rules: Vec<ComputedGrpcRouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedTcpRouteRule {
    pub backend_refs: Vec<ComputedBackendRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedTcpRoute {
    pub rules: Vec<ComputedTcpRouteRule>,
}

/// The merged rule set a port ends up with, keyed by the winning protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputedPortConfig {
    Http(ComputedHttpRoute),
    Grpc(ComputedGrpcRoute),
    Tcp(ComputedTcpRoute),
}

/// Everything the data plane needs to know about one resolved backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTargetDetails {
    pub backend_ref: BackendRef,
    pub mesh_port: String,
    pub service: Service,
    pub failover_config: Option<FailoverConfig>,
    pub destination_config: Option<DestinationConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedPortRoutes {
    pub config: ComputedPortConfig,
    pub parent_ref: ParentRef,
    pub protocol: Protocol,
    pub using_default_config: bool,
    pub targets: BTreeMap<String, BackendTargetDetails>,
}

/// The consolidated routing table for one service, keyed by routable port.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedRoutes {
    pub ported_configs: BTreeMap<String, ComputedPortRoutes>,
}

impl ComputedRoutes {
    /// Every reference this output binds to: parent services, backend
    /// services (and their name-aligned policies), and failover destination
    /// services. Tracked against the mapper so that removing a reference
    /// from a route still notifies the services that used to depend on it
    /// for one more cycle.
    pub fn bound_references(&self) -> Vec<RefKey> {
        let mut out = Vec::new();
        for port_routes in self.ported_configs.values() {
            out.push(port_routes.parent_ref.service.key());
            for details in port_routes.targets.values() {
                let backend = details.backend_ref.service.key();
                out.push(backend.with_kind(ResourceKind::FailoverPolicy));
                out.push(backend.with_kind(ResourceKind::DestinationPolicy));
                if let Some(failover) = &details.failover_config {
                    for dest in &failover.destinations {
                        out.push(dest.service.key());
                    }
                }
                out.push(backend);
            }
        }
        out.sort();
        out.dedup();
        out
    }
}
