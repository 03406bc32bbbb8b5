use crate::{
    computed::ComputedRoutes,
    policy::{DestinationPolicy, FailoverPolicy},
    reference::{Id, ResourceKind, Stamp, Version},
    service::Service,
    xroute::{GrpcRoute, HttpRoute, TcpRoute, XRouteRef},
};
use serde::{Deserialize, Serialize};

/// Storage metadata common to every resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub id: Id,
    pub version: Version,
    pub generation: Stamp,
    pub owner: Option<Id>,
}

/// A decoded resource payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Service(Service),
    HttpRoute(HttpRoute),
    GrpcRoute(GrpcRoute),
    TcpRoute(TcpRoute),
    FailoverPolicy(FailoverPolicy),
    DestinationPolicy(DestinationPolicy),
    ComputedRoutes(ComputedRoutes),
}

impl Payload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Service(_) => ResourceKind::Service,
            Self::HttpRoute(_) => ResourceKind::HttpRoute,
            Self::GrpcRoute(_) => ResourceKind::GrpcRoute,
            Self::TcpRoute(_) => ResourceKind::TcpRoute,
            Self::FailoverPolicy(_) => ResourceKind::FailoverPolicy,
            Self::DestinationPolicy(_) => ResourceKind::DestinationPolicy,
            Self::ComputedRoutes(_) => ResourceKind::ComputedRoutes,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub meta: Meta,
    pub payload: Payload,
}

/// Typed accessors. Calling one against the wrong payload kind is a
/// programmer error and panics; recovering would mask real bugs.
impl Resource {
    pub fn as_service(&self) -> &Service {
        match &self.payload {
            Payload::Service(data) => data,
            other => panic!("expected Service payload for {}, got {}", self.meta.id, other.kind()),
        }
    }

    pub fn as_http_route(&self) -> &HttpRoute {
        match &self.payload {
            Payload::HttpRoute(data) => data,
            other => panic!("expected HTTPRoute payload for {}, got {}", self.meta.id, other.kind()),
        }
    }

    pub fn as_grpc_route(&self) -> &GrpcRoute {
        match &self.payload {
            Payload::GrpcRoute(data) => data,
            other => panic!("expected GRPCRoute payload for {}, got {}", self.meta.id, other.kind()),
        }
    }

    pub fn as_tcp_route(&self) -> &TcpRoute {
        match &self.payload {
            Payload::TcpRoute(data) => data,
            other => panic!("expected TCPRoute payload for {}, got {}", self.meta.id, other.kind()),
        }
    }

    pub fn as_failover_policy(&self) -> &FailoverPolicy {
        match &self.payload {
            Payload::FailoverPolicy(data) => data,
            other => panic!(
                "expected FailoverPolicy payload for {}, got {}",
                self.meta.id,
                other.kind()
            ),
        }
    }

    pub fn as_destination_policy(&self) -> &DestinationPolicy {
        match &self.payload {
            Payload::DestinationPolicy(data) => data,
            other => panic!(
                "expected DestinationPolicy payload for {}, got {}",
                self.meta.id,
                other.kind()
            ),
        }
    }

    pub fn as_computed_routes(&self) -> &ComputedRoutes {
        match &self.payload {
            Payload::ComputedRoutes(data) => data,
            other => panic!(
                "expected ComputedRoutes payload for {}, got {}",
                self.meta.id,
                other.kind()
            ),
        }
    }

    pub fn as_xroute(&self) -> XRouteRef<'_> {
        match &self.payload {
            Payload::HttpRoute(data) => XRouteRef::Http(data),
            Payload::GrpcRoute(data) => XRouteRef::Grpc(data),
            Payload::TcpRoute(data) => XRouteRef::Tcp(data),
            other => panic!("expected xRoute payload for {}, got {}", self.meta.id, other.kind()),
        }
    }
}
