use crate::{loader::RelatedResources, pending_status::PendingStatuses, sort};
use mesh_routes_controller_core::{
    computed::{
        backend_target_key, ComputedBackendRef, ComputedGrpcRoute, ComputedGrpcRouteRule,
        ComputedHttpRoute, ComputedHttpRouteRule, ComputedPortConfig, ComputedPortRoutes,
        ComputedTcpRoute, ComputedTcpRouteRule,
    },
    policy::{FailoverConfig, FailoverDestination},
    xroute::{
        GrpcRouteMatch, GrpcRouteRule, HttpRouteMatch, HttpRouteRule, PathMatch, TcpRouteRule,
        XRouteRef,
    },
    BackendRef, BackendTargetDetails, ComputedRoutes, Condition, Id, Meta, ParentRef, Protocol,
    RefKey, ResourceKind, ServicePort, NULL_ROUTE_BACKEND,
};
use std::collections::BTreeMap;

/// One per requested (or co-discovered) ComputedRoutes. `data: None` is the
/// deletion tombstone for services that are absent or outside the mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputedRoutesResult {
    pub id: Id,
    pub owner: Option<Id>,
    pub data: Option<ComputedRoutes>,
}

/// Compiles the snapshot into one ComputedRoutes per requested service.
/// Never fails: every anomaly becomes a status condition on the offending
/// source resource while the output degrades to null-routing.
pub fn generate_computed_routes(
    related: &RelatedResources,
    pending: &mut PendingStatuses,
) -> Vec<ComputedRoutesResult> {
    related
        .computed_routes_ids()
        .iter()
        .map(|cr_id| {
            let service_key = cr_id.key().with_kind(ResourceKind::Service);
            let Some(service_res) = related.service(&service_key) else {
                return tombstone(cr_id);
            };
            let service = service_res.as_service();
            if !service.is_mesh_enabled() {
                tracing::debug!(service = %service_key, "service is not in the mesh");
                return tombstone(cr_id);
            }

            let mut ported_configs = BTreeMap::new();
            for port in service.routable_ports() {
                let port_routes = compile_port(related, &service_key, port, pending);
                ported_configs.insert(port.target_port.clone(), port_routes);
            }

            ComputedRoutesResult {
                id: cr_id.clone(),
                owner: Some(service_res.meta.id.clone()),
                data: Some(ComputedRoutes { ported_configs }),
            }
        })
        .collect()
}

fn tombstone(id: &Id) -> ComputedRoutesResult {
    ComputedRoutesResult {
        id: id.clone(),
        owner: None,
        data: None,
    }
}

/// The rules of one candidate route, still in their authored form.
enum NodeRules {
    Http(Vec<HttpRouteRule>),
    Grpc(Vec<GrpcRouteRule>),
    Tcp(Vec<TcpRouteRule>),
}

impl NodeRules {
    fn kind(&self) -> ResourceKind {
        match self {
            Self::Http(_) => ResourceKind::HttpRoute,
            Self::Grpc(_) => ResourceKind::GrpcRoute,
            Self::Tcp(_) => ResourceKind::TcpRoute,
        }
    }

    fn append(&mut self, other: NodeRules) {
        match (self, other) {
            (Self::Http(mine), Self::Http(theirs)) => mine.extend(theirs),
            (Self::Grpc(mine), Self::Grpc(theirs)) => mine.extend(theirs),
            (Self::Tcp(mine), Self::Tcp(theirs)) => mine.extend(theirs),
            (mine, theirs) => panic!(
                "cannot merge {} rules into a {} route",
                theirs.kind(),
                mine.kind()
            ),
        }
    }
}

struct RouteNode<'a> {
    meta: &'a Meta,
    rules: NodeRules,
}

/// A backend admitted into the port's target set; details attached after
/// the rules are final.
struct ResolvedTarget {
    service: RefKey,
    port: String,
    backend_ref: BackendRef,
}

fn compile_port(
    related: &RelatedResources,
    service_key: &RefKey,
    port: &ServicePort,
    pending: &mut PendingStatuses,
) -> ComputedPortRoutes {
    let port_name = port.target_port.as_str();
    let parent_ref = ParentRef::new(service_key.to_ref(), Some(port_name.to_string()));

    // wildcard parent refs expand to every routable port, so a bare service
    // match is enough here
    let mut nodes: Vec<RouteNode<'_>> = Vec::new();
    for route in related.routes_bound_to(service_key) {
        let bound = route
            .as_xroute()
            .parent_refs()
            .iter()
            .any(|parent| parent_binds(parent, service_key, port_name));
        if !bound {
            continue;
        }
        let rules = match route.as_xroute() {
            XRouteRef::Http(http) => NodeRules::Http(http.rules.clone()),
            XRouteRef::Grpc(grpc) => NodeRules::Grpc(grpc.rules.clone()),
            XRouteRef::Tcp(tcp) => NodeRules::Tcp(tcp.rules.clone()),
        };
        nodes.push(RouteNode {
            meta: &route.meta,
            rules,
        });
    }

    let using_default_config = nodes.is_empty();
    let merged = if using_default_config {
        default_rules(service_key, port)
    } else {
        nodes.sort_by(|a, b| sort::route_precedence(a.meta, b.meta));
        let mut iter = nodes.into_iter();
        let mut winner = iter.next().expect("candidate list is non-empty");
        for node in iter {
            if node.rules.kind() == winner.rules.kind() {
                winner.rules.append(node.rules);
            } else {
                // the winner's protocol is authoritative for the port
                pending.add(
                    node.meta.id.clone(),
                    Condition::ConflictNotBoundToParentRef {
                        parent_ref: service_key.to_ref(),
                        port: port_name.to_string(),
                        accepted_kind: winner.rules.kind(),
                    },
                );
            }
        }
        winner.rules
    };

    let mut resolved: BTreeMap<String, ResolvedTarget> = BTreeMap::new();
    let config = match merged {
        NodeRules::Http(rules) => {
            let mut computed: Vec<ComputedHttpRouteRule> = rules
                .into_iter()
                .map(|rule| compile_http_rule(related, rule, port_name, &mut resolved))
                .collect();
            computed.sort_by(sort::http_rule_specificity);
            if !using_default_config {
                computed.push(http_catch_all());
            }
            ComputedPortConfig::Http(ComputedHttpRoute { rules: computed })
        }
        NodeRules::Grpc(rules) => {
            // no specificity pass for grpc; creation-order tie-breaks only
            let mut computed: Vec<ComputedGrpcRouteRule> = rules
                .into_iter()
                .map(|rule| compile_grpc_rule(related, rule, port_name, &mut resolved))
                .collect();
            if !using_default_config {
                computed.push(grpc_catch_all());
            }
            ComputedPortConfig::Grpc(ComputedGrpcRoute { rules: computed })
        }
        NodeRules::Tcp(rules) => {
            // tcp rules have no match criteria; the last rule is reachable
            // without a catch-all
            let computed: Vec<ComputedTcpRouteRule> = rules
                .into_iter()
                .map(|rule| compile_tcp_rule(related, rule, port_name, &mut resolved))
                .collect();
            ComputedPortConfig::Tcp(ComputedTcpRoute { rules: computed })
        }
    };

    let targets = attach_target_details(related, resolved);

    ComputedPortRoutes {
        config,
        parent_ref,
        protocol: port.protocol,
        using_default_config,
        targets,
    }
}

fn parent_binds(parent: &ParentRef, service_key: &RefKey, port_name: &str) -> bool {
    if parent.service.key().with_kind(ResourceKind::Service) != *service_key {
        return false;
    }
    match &parent.port {
        None => true,
        Some(port) => port == port_name,
    }
}

/// A synthesized single-rule route forwarding all traffic to the service
/// itself on this port.
fn default_rules(service_key: &RefKey, port: &ServicePort) -> NodeRules {
    let backend = BackendRef::new(
        service_key.to_ref(),
        Some(port.target_port.clone()),
        1,
    );
    match port.protocol {
        Protocol::Http | Protocol::Http2 => NodeRules::Http(vec![HttpRouteRule {
            matches: vec![HttpRouteMatch {
                path: Some(PathMatch::Prefix("/".to_string())),
                ..Default::default()
            }],
            backend_refs: vec![backend],
            ..Default::default()
        }]),
        Protocol::Grpc => NodeRules::Grpc(vec![GrpcRouteRule {
            matches: vec![GrpcRouteMatch::default()],
            backend_refs: vec![backend],
            ..Default::default()
        }]),
        Protocol::Tcp => NodeRules::Tcp(vec![TcpRouteRule {
            backend_refs: vec![backend],
        }]),
        Protocol::Mesh => panic!("mesh ports are not routable"),
    }
}

fn compile_http_rule(
    related: &RelatedResources,
    rule: HttpRouteRule,
    port: &str,
    resolved: &mut BTreeMap<String, ResolvedTarget>,
) -> ComputedHttpRouteRule {
    ComputedHttpRouteRule {
        matches: rule.matches,
        filters: rule.filters,
        backend_refs: rule
            .backend_refs
            .into_iter()
            .map(|backend| compile_backend(related, backend, port, resolved))
            .collect(),
        timeouts: rule.timeouts,
        retries: rule.retries,
    }
}

fn compile_grpc_rule(
    related: &RelatedResources,
    rule: GrpcRouteRule,
    port: &str,
    resolved: &mut BTreeMap<String, ResolvedTarget>,
) -> ComputedGrpcRouteRule {
    ComputedGrpcRouteRule {
        matches: rule.matches,
        filters: rule.filters,
        backend_refs: rule
            .backend_refs
            .into_iter()
            .map(|backend| compile_backend(related, backend, port, resolved))
            .collect(),
        timeouts: rule.timeouts,
        retries: rule.retries,
    }
}

fn compile_tcp_rule(
    related: &RelatedResources,
    rule: TcpRouteRule,
    port: &str,
    resolved: &mut BTreeMap<String, ResolvedTarget>,
) -> ComputedTcpRouteRule {
    ComputedTcpRouteRule {
        backend_refs: rule
            .backend_refs
            .into_iter()
            .map(|backend| compile_backend(related, backend, port, resolved))
            .collect(),
    }
}

/// An invalid backend is not dropped; it becomes the reserved null-route
/// target so traffic is explicitly discarded rather than misrouted.
fn compile_backend(
    related: &RelatedResources,
    backend: BackendRef,
    compiled_port: &str,
    resolved: &mut BTreeMap<String, ResolvedTarget>,
) -> ComputedBackendRef {
    let weight = backend.weight.max(1);
    let service_key = backend.service.key().with_kind(ResourceKind::Service);

    let Some(res) = related.service(&service_key) else {
        tracing::debug!(backend = %service_key, "null-routing backend: service does not exist");
        return null_route(weight);
    };
    let service = res.as_service();
    if !service.is_mesh_enabled() {
        tracing::debug!(backend = %service_key, "null-routing backend: service is not in the mesh");
        return null_route(weight);
    }

    let backend_port = backend
        .port
        .clone()
        .unwrap_or_else(|| compiled_port.to_string());
    match service.port(&backend_port) {
        None => {
            tracing::debug!(backend = %service_key, port = %backend_port, "null-routing backend: unknown port");
            null_route(weight)
        }
        Some(sp) if sp.protocol == Protocol::Mesh => {
            tracing::debug!(backend = %service_key, port = %backend_port, "null-routing backend: mesh port");
            null_route(weight)
        }
        Some(_) => {
            let key = backend_target_key(&service_key, &backend_port);
            resolved.entry(key.clone()).or_insert_with(|| ResolvedTarget {
                service: service_key,
                port: backend_port.clone(),
                backend_ref: BackendRef::new(backend.service, Some(backend_port), weight),
            });
            ComputedBackendRef {
                backend_target: key,
                weight,
            }
        }
    }
}

fn null_route(weight: u32) -> ComputedBackendRef {
    ComputedBackendRef {
        backend_target: NULL_ROUTE_BACKEND.to_string(),
        weight,
    }
}

fn http_catch_all() -> ComputedHttpRouteRule {
    ComputedHttpRouteRule {
        matches: vec![HttpRouteMatch {
            path: Some(PathMatch::Prefix("/".to_string())),
            ..Default::default()
        }],
        backend_refs: vec![null_route(1)],
        ..Default::default()
    }
}

fn grpc_catch_all() -> ComputedGrpcRouteRule {
    ComputedGrpcRouteRule {
        matches: vec![GrpcRouteMatch::default()],
        backend_refs: vec![null_route(1)],
        ..Default::default()
    }
}

/// Resolves the admitted targets. Admission already checked resolvability,
/// so a missing service here is an internal invariant violation.
fn attach_target_details(
    related: &RelatedResources,
    resolved: BTreeMap<String, ResolvedTarget>,
) -> BTreeMap<String, BackendTargetDetails> {
    resolved
        .into_iter()
        .map(|(key, target)| {
            let res = related.service(&target.service).unwrap_or_else(|| {
                panic!("backend target {key} was admitted without a resolvable service")
            });
            let service = res.as_service().clone();
            let mesh_port = service
                .mesh_port()
                .unwrap_or_else(|| panic!("backend target {key} has no mesh port"))
                .to_string();

            let failover_config = simplified_failover(related, &target.service, &target.port);
            let destination_config = related
                .destination_policy(&target.service.with_kind(ResourceKind::DestinationPolicy))
                .and_then(|dp| {
                    dp.as_destination_policy()
                        .port_configs
                        .get(&target.port)
                        .cloned()
                });

            let details = BackendTargetDetails {
                backend_ref: target.backend_ref,
                mesh_port,
                service,
                failover_config,
                destination_config,
            };
            (key, details)
        })
        .collect()
}

/// Collapses the target's failover policy for one port: only destinations
/// that resolve to a known, mesh-enabled service with a usable port survive.
fn simplified_failover(
    related: &RelatedResources,
    service_key: &RefKey,
    port: &str,
) -> Option<FailoverConfig> {
    let policy = related.failover_policy(&service_key.with_kind(ResourceKind::FailoverPolicy))?;
    let config = policy.as_failover_policy().port_configs.get(port)?;

    let destinations: Vec<FailoverDestination> = config
        .destinations
        .iter()
        .filter_map(|dest| {
            let dest_key = dest.service.key().with_kind(ResourceKind::Service);
            let dest_service = related.service(&dest_key)?.as_service();
            if !dest_service.is_mesh_enabled() {
                return None;
            }
            let dest_port = dest.port.clone().unwrap_or_else(|| port.to_string());
            match dest_service.port(&dest_port) {
                Some(sp) if sp.protocol != Protocol::Mesh => Some(FailoverDestination {
                    service: dest.service.clone(),
                    port: Some(dest_port),
                }),
                _ => None,
            }
        })
        .collect();

    if destinations.is_empty() {
        None
    } else {
        Some(FailoverConfig { destinations })
    }
}
