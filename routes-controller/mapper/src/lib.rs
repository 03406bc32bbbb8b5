#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The incremental dependency index for routing resolution: tracks
//! route→service and failover→service links as resources are observed, and
//! answers "which ComputedRoutes must be recomputed" when any upstream
//! resource changes.

use mesh_routes_controller_core::{
    computed::ComputedRoutes, policy::FailoverPolicy, Id, Ref, RefKey, Resource, ResourceKind,
    XRouteRef,
};
use parking_lot::Mutex;

mod bimapper;
pub mod metrics;


use self::bimapper::Bimapper;

/// Process-wide shared index. All mutations and queries serialize through a
/// single mutex; each call observes a consistent snapshot.
#[derive(Debug, Default)]
pub struct XRouteMapper {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    http_parent: Bimapper,
    http_backend: Bimapper,
    grpc_parent: Bimapper,
    grpc_backend: Bimapper,
    tcp_parent: Bimapper,
    tcp_backend: Bimapper,

    // failover policy id -> destination service refs
    failover: Bimapper,

    // previous ComputedRoutes output id -> every reference bound by it;
    // keeps notifications flowing for exactly one more cycle after a
    // reference is removed from a route, until the output catches up
    bound: Bimapper,
}

impl Inner {
    fn route_indexes(&mut self, kind: ResourceKind) -> (&mut Bimapper, &mut Bimapper) {
        match kind {
            ResourceKind::HttpRoute => (&mut self.http_parent, &mut self.http_backend),
            ResourceKind::GrpcRoute => (&mut self.grpc_parent, &mut self.grpc_backend),
            ResourceKind::TcpRoute => (&mut self.tcp_parent, &mut self.tcp_backend),
            other => panic!("{other} is not an xRoute kind"),
        }
    }

    fn parent_service_refs(&self, route_id: &Id) -> Vec<RefKey> {
        match route_id.kind {
            ResourceKind::HttpRoute => self.http_parent.links_by_item(route_id),
            ResourceKind::GrpcRoute => self.grpc_parent.links_by_item(route_id),
            ResourceKind::TcpRoute => self.tcp_parent.links_by_item(route_id),
            other => panic!("{other} is not an xRoute kind"),
        }
    }
}

fn service_key(reference: &Ref) -> RefKey {
    reference.key().with_kind(ResourceKind::Service)
}

fn computed_routes_id(service: &RefKey) -> Id {
    service.with_kind(ResourceKind::ComputedRoutes).to_id()
}

impl XRouteMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the route's current parent-service and backend-service links,
    /// replacing any prior links for this id.
    pub fn track_xroute(&self, id: &Id, route: XRouteRef<'_>) {
        assert_eq!(id.kind, route.kind(), "route id kind does not match payload");
        let parents = route.parent_refs().iter().map(|p| service_key(&p.service));
        let backends: Vec<RefKey> = route
            .backend_refs()
            .iter()
            .map(|b| service_key(&b.service))
            .collect();

        let mut inner = self.inner.lock();
        let (parent_index, backend_index) = inner.route_indexes(id.kind);
        parent_index.track(id, parents);
        backend_index.track(id, backends);
        tracing::trace!(route = %id, "tracked route links");
    }

    /// Removes all links for a deleted route.
    pub fn untrack_xroute(&self, id: &Id) {
        let mut inner = self.inner.lock();
        let (parent_index, backend_index) = inner.route_indexes(id.kind);
        parent_index.untrack(id);
        backend_index.untrack(id);
        tracing::trace!(route = %id, "untracked route links");
    }

    pub fn track_failover_policy(&self, id: &Id, policy: &FailoverPolicy) {
        let links: Vec<RefKey> = policy
            .destination_service_refs()
            .map(service_key)
            .collect();
        self.inner.lock().failover.track(id, links);
    }

    pub fn untrack_failover_policy(&self, id: &Id) {
        self.inner.lock().failover.untrack(id);
    }

    /// Records the previous output's full bound-reference set.
    pub fn track_computed_routes(&self, id: &Id, data: &ComputedRoutes) {
        self.inner.lock().bound.track(id, data.bound_references());
    }

    pub fn untrack_computed_routes(&self, id: &Id) {
        self.inner.lock().bound.untrack(id);
    }

    /// Routes of any kind whose parent refs include this service.
    pub fn route_ids_by_parent_service_ref(&self, service: &RefKey) -> Vec<Id> {
        let inner = self.inner.lock();
        let mut ids = inner.http_parent.items_by_link(service);
        ids.extend(inner.grpc_parent.items_by_link(service));
        ids.extend(inner.tcp_parent.items_by_link(service));
        ids.sort();
        ids
    }

    /// Routes of any kind with a backend ref on this service.
    pub fn route_ids_by_backend_service_ref(&self, service: &RefKey) -> Vec<Id> {
        let inner = self.inner.lock();
        let mut ids = inner.http_backend.items_by_link(service);
        ids.extend(inner.grpc_backend.items_by_link(service));
        ids.extend(inner.tcp_backend.items_by_link(service));
        ids.sort();
        ids
    }

    pub fn map_http_route(&self, res: &Resource) -> Vec<Id> {
        self.map_xroute(res)
    }

    pub fn map_grpc_route(&self, res: &Resource) -> Vec<Id> {
        self.map_xroute(res)
    }

    pub fn map_tcp_route(&self, res: &Resource) -> Vec<Id> {
        self.map_xroute(res)
    }

    /// Tracks the route and returns the ComputedRoutes needing recomputation
    /// because of it: one per parent service. Duplicates are permitted; the
    /// caller dedupes with [`dedupe_requests`].
    fn map_xroute(&self, res: &Resource) -> Vec<Id> {
        let route = res.as_xroute();
        self.track_xroute(&res.meta.id, route);

        route
            .parent_refs()
            .iter()
            .map(|parent| computed_routes_id(&service_key(&parent.service)))
            .collect()
    }

    /// A failover policy is name-aligned with its service; a change affects
    /// every ComputedRoutes that resolves that service as a backend target.
    pub fn map_failover_policy(&self, res: &Resource) -> Vec<Id> {
        self.track_failover_policy(&res.meta.id, res.as_failover_policy());
        self.requests_for_changed_service(&res.meta.id.key().with_kind(ResourceKind::Service))
    }

    /// Destination policies carry no outbound links of their own; only the
    /// name-aligned service's dependents are affected.
    pub fn map_destination_policy(&self, res: &Resource) -> Vec<Id> {
        self.requests_for_changed_service(
            &res.meta.id.key().with_kind(ResourceKind::Service),
        )
    }

    /// Which ComputedRoutes must be recomputed when this service changes.
    ///
    /// Walks failover policies in both directions: a change to a service
    /// that is someone else's failover destination must also recompute the
    /// dependents of the service that would fail over to it.
    pub fn map_service(&self, id: &Id) -> Vec<Id> {
        let changed = id.key();

        let mut affected = vec![changed.clone()];
        {
            let inner = self.inner.lock();
            for policy_id in inner.failover.items_by_link(&changed) {
                // failover policies are name-aligned with their service
                affected.push(policy_id.key().with_kind(ResourceKind::Service));
            }
        }

        let mut out = Vec::new();
        for service in &affected {
            out.extend(self.requests_for_changed_service(service));
        }
        out
    }

    fn requests_for_changed_service(&self, service: &RefKey) -> Vec<Id> {
        let mut out = vec![computed_routes_id(service)];

        let route_ids = self.route_ids_by_backend_service_ref(service);
        {
            let inner = self.inner.lock();
            for route_id in route_ids {
                for parent in inner.parent_service_refs(&route_id) {
                    out.push(computed_routes_id(&parent));
                }
            }
            out.extend(inner.bound.items_by_link(service));
        }
        out
    }

    pub(crate) fn index_sizes(&self) -> Vec<(&'static str, usize, usize)> {
        let inner = self.inner.lock();
        vec![
            ("http_route_parent_refs", inner.http_parent.item_count(), inner.http_parent.link_count()),
            ("http_route_backend_refs", inner.http_backend.item_count(), inner.http_backend.link_count()),
            ("grpc_route_parent_refs", inner.grpc_parent.item_count(), inner.grpc_parent.link_count()),
            ("grpc_route_backend_refs", inner.grpc_backend.item_count(), inner.grpc_backend.link_count()),
            ("tcp_route_parent_refs", inner.tcp_parent.item_count(), inner.tcp_parent.link_count()),
            ("tcp_route_backend_refs", inner.tcp_backend.item_count(), inner.tcp_backend.link_count()),
            ("failover_destinations", inner.failover.item_count(), inner.failover.link_count()),
            ("bound_references", inner.bound.item_count(), inner.bound.link_count()),
        ]
    }
}

/// Collapses a batch of recomputation requests to one work item per logical
/// key. Storage uids are ignored: several events may name the same
/// ComputedRoutes through different observations of it.
pub fn dedupe_requests(mut ids: Vec<Id>) -> Vec<Id> {
    ids.sort_by(|a, b| a.key().cmp(&b.key()).then_with(|| a.uid.cmp(&b.uid)));
    ids.dedup_by(|a, b| a.key() == b.key());
    ids
}
