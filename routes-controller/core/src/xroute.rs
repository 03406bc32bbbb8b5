use crate::reference::{Ref, ResourceKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attaches a route to a service. An empty port means "all user-routable
/// ports of that service".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub service: Ref,
    pub port: Option<String>,
}

impl ParentRef {
    pub fn new(service: Ref, port: Option<String>) -> Self {
        Self { service, port }
    }
}

/// Points a rule at a destination service, optionally pinned to a port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRef {
    pub service: Ref,
    pub port: Option<String>,
    pub weight: u32,
}

impl BackendRef {
    pub fn new(service: Ref, port: Option<String>, weight: u32) -> Self {
        Self {
            service,
            port,
            weight,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathMatch {
    Exact(String),
    Prefix(String),
    Regex(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderMatch {
    Exact { name: String, value: String },
    Prefix { name: String, value: String },
    Suffix { name: String, value: String },
    Regex { name: String, value: String },
    Present { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryParamMatch {
    Exact { name: String, value: String },
    Regex { name: String, value: String },
    Present { name: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRouteMatch {
    pub path: Option<PathMatch>,
    pub headers: Vec<HeaderMatch>,
    pub query_params: Vec<QueryParamMatch>,
    pub method: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderModifier {
    pub add: Vec<(String, String)>,
    pub set: Vec<(String, String)>,
    pub remove: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteFilter {
    RequestHeaderModifier(HeaderModifier),
    ResponseHeaderModifier(HeaderModifier),
    UrlRewrite { path_prefix: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTimeouts {
    pub request: Option<Duration>,
    pub idle: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRetries {
    pub number: Option<u32>,
    pub on_connect_failure: bool,
    pub on_status_codes: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRouteRule {
    pub matches: Vec<HttpRouteMatch>,
    pub filters: Vec<RouteFilter>,
    pub backend_refs: Vec<BackendRef>,
    pub timeouts: Option<RouteTimeouts>,
    pub retries: Option<RouteRetries>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRoute {
    pub parent_refs: Vec<ParentRef>,
    pub rules: Vec<HttpRouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrpcMethodMatch {
    pub service: Option<String>,
    pub method: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrpcRouteMatch {
    pub method: Option<GrpcMethodMatch>,
    pub headers: Vec<HeaderMatch>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrpcRouteRule {
    pub matches: Vec<GrpcRouteMatch>,
    pub filters: Vec<RouteFilter>,
    pub backend_refs: Vec<BackendRef>,
    pub timeouts: Option<RouteTimeouts>,
    pub retries: Option<RouteRetries>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrpcRoute {
    pub parent_refs: Vec<ParentRef>,
    pub rules: Vec<GrpcRouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpRouteRule {
    pub backend_refs: Vec<BackendRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpRoute {
    pub parent_refs: Vec<ParentRef>,
    pub rules: Vec<TcpRouteRule>,
}

/// A borrowed view over the three route kinds, for the code paths that only
/// care about the shared "has parent refs, has backend refs" capability.
#[derive(Copy, Clone, Debug)]
pub enum XRouteRef<'a> {
    Http(&'a HttpRoute),
    Grpc(&'a GrpcRoute),
    Tcp(&'a TcpRoute),
}

impl<'a> XRouteRef<'a> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Http(_) => ResourceKind::HttpRoute,
            Self::Grpc(_) => ResourceKind::GrpcRoute,
            Self::Tcp(_) => ResourceKind::TcpRoute,
        }
    }

    pub fn parent_refs(&self) -> &'a [ParentRef] {
        match self {
            Self::Http(route) => &route.parent_refs,
            Self::Grpc(route) => &route.parent_refs,
            Self::Tcp(route) => &route.parent_refs,
        }
    }

    pub fn backend_refs(&self) -> Vec<&'a BackendRef> {
        match self {
            Self::Http(route) => route
                .rules
                .iter()
                .flat_map(|r| r.backend_refs.iter())
                .collect(),
            Self::Grpc(route) => route
                .rules
                .iter()
                .flat_map(|r| r.backend_refs.iter())
                .collect(),
            Self::Tcp(route) => route
                .rules
                .iter()
                .flat_map(|r| r.backend_refs.iter())
                .collect(),
        }
    }
}
