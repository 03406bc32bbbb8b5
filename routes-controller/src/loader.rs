use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use mesh_routes_controller_core::{
    Id, Payload, Ref, RefKey, Resource, ResourceKind, ResourceStore, StoreError,
};
use mesh_routes_controller_mapper::XRouteMapper;
use std::collections::{BTreeSet, VecDeque};

/// Everything one compute cycle needs, assembled by the loader and owned
/// exclusively by that cycle. Insertion is first-write-wins per reference
/// key, so the bag never holds duplicates.
#[derive(Debug, Default)]
pub struct RelatedResources {
    computed_routes_ids: Vec<Id>,
    services: HashMap<RefKey, Resource>,
    failover_policies: HashMap<RefKey, Resource>,
    destination_policies: HashMap<RefKey, Resource>,
    http_routes: HashMap<RefKey, Resource>,
    grpc_routes: HashMap<RefKey, Resource>,
    tcp_routes: HashMap<RefKey, Resource>,

    // service -> routes that parent-ref it
    routes_by_parent: HashMap<RefKey, BTreeSet<RefKey>>,
}

impl RelatedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_computed_routes_id(&mut self, id: Id) {
        if !self.computed_routes_ids.iter().any(|have| have.key() == id.key()) {
            self.computed_routes_ids.push(id);
        }
    }

    pub fn add_resource(&mut self, res: Resource) {
        let key = res.meta.id.key();
        let map = match res.payload {
            Payload::Service(_) => &mut self.services,
            Payload::FailoverPolicy(_) => &mut self.failover_policies,
            Payload::DestinationPolicy(_) => &mut self.destination_policies,
            Payload::HttpRoute(_) => &mut self.http_routes,
            Payload::GrpcRoute(_) => &mut self.grpc_routes,
            Payload::TcpRoute(_) => &mut self.tcp_routes,
            Payload::ComputedRoutes(_) => {
                panic!("computed routes are an output, not an input: {}", res.meta.id)
            }
        };
        map.entry(key).or_insert(res);
    }

    pub fn add_route_binding(&mut self, service: RefKey, route: RefKey) {
        self.routes_by_parent.entry(service).or_default().insert(route);
    }

    pub fn computed_routes_ids(&self) -> &[Id] {
        &self.computed_routes_ids
    }

    pub fn service(&self, key: &RefKey) -> Option<&Resource> {
        self.services.get(key)
    }

    pub fn failover_policy(&self, key: &RefKey) -> Option<&Resource> {
        self.failover_policies.get(key)
    }

    pub fn destination_policy(&self, key: &RefKey) -> Option<&Resource> {
        self.destination_policies.get(key)
    }

    pub fn route(&self, key: &RefKey) -> Option<&Resource> {
        match key.kind {
            ResourceKind::HttpRoute => self.http_routes.get(key),
            ResourceKind::GrpcRoute => self.grpc_routes.get(key),
            ResourceKind::TcpRoute => self.tcp_routes.get(key),
            other => panic!("{other} is not an xRoute kind"),
        }
    }

    /// The loaded routes that parent-ref this service, in key order.
    pub fn routes_bound_to(&self, service: &RefKey) -> Vec<&Resource> {
        self.routes_by_parent
            .get(service)
            .into_iter()
            .flatten()
            .filter_map(|route_key| self.route(route_key))
            .collect()
    }

    pub fn all_routes(&self) -> impl Iterator<Item = &Resource> {
        self.http_routes
            .values()
            .chain(self.grpc_routes.values())
            .chain(self.tcp_routes.values())
    }
}

/// Assembles the transitive resource graph needed to compute routes for the
/// seeded target, breadth-first with a visited set so multi-parent routes
/// spanning services terminate. Store errors abort the cycle; not-found is
/// recorded absence.
pub async fn load_resources_for_computed_routes(
    store: &dyn ResourceStore,
    mapper: &XRouteMapper,
    seed: Id,
) -> Result<RelatedResources, StoreError> {
    assert_eq!(
        seed.kind,
        ResourceKind::ComputedRoutes,
        "loader seeded with a non-ComputedRoutes id: {seed}"
    );

    let mut loader = Loader {
        store,
        mapper,
        related: RelatedResources::new(),
        to_load: VecDeque::new(),
        seen: HashSet::new(),
        loaded_services: HashSet::new(),
    };

    let seed_key = seed.key();
    loader.seen.insert(seed_key.clone());
    loader.to_load.push_back(seed_key);

    while let Some(key) = loader.to_load.pop_front() {
        loader.load_one(&key).await?;
    }

    Ok(loader.related)
}

struct Loader<'a> {
    store: &'a dyn ResourceStore,
    mapper: &'a XRouteMapper,
    related: RelatedResources,
    to_load: VecDeque<RefKey>,
    seen: HashSet<RefKey>,
    // services that already got the full service+failover+policy treatment
    loaded_services: HashSet<RefKey>,
}

impl Loader<'_> {
    async fn load_one(&mut self, cr_key: &RefKey) -> Result<(), StoreError> {
        self.related.add_computed_routes_id(cr_key.to_id());

        let service_key = cr_key.with_kind(ResourceKind::Service);
        if !self.load_service_and_policies(&service_key).await? {
            // nothing routes there
            tracing::debug!(service = %service_key, "aligned service does not exist");
            return Ok(());
        }

        for route_id in self.mapper.route_ids_by_parent_service_ref(&service_key) {
            self.load_route(&service_key, &route_id).await?;
        }
        Ok(())
    }

    async fn load_route(&mut self, service_key: &RefKey, route_id: &Id) -> Result<(), StoreError> {
        let route_key = route_id.key();
        let route = match self.related.route(&route_key) {
            Some(route) => route.clone(),
            None => match self.store.get(&route_key).await? {
                Some(route) => route,
                None => {
                    tracing::debug!(route = %route_id, "indexed route no longer exists");
                    return Ok(());
                }
            },
        };

        // refresh the index from what we actually observed
        self.mapper.track_xroute(&route.meta.id, route.as_xroute());
        self.related.add_resource(route.clone());

        let xroute = route.as_xroute();
        for parent in xroute.parent_refs() {
            let parent_key = service_ref_key(&parent.service);
            self.related
                .add_route_binding(parent_key.clone(), route_key.clone());

            // a multi-parent route co-binds other services; their computed
            // routes must be regenerated from the same snapshot
            if parent_key != *service_key {
                let other = parent_key.with_kind(ResourceKind::ComputedRoutes);
                if self.seen.insert(other.clone()) {
                    self.to_load.push_back(other);
                }
            }
        }

        let backends: Vec<RefKey> = xroute
            .backend_refs()
            .iter()
            .map(|backend| service_ref_key(&backend.service))
            .collect();
        for backend in backends {
            self.load_service_and_policies(&backend).await?;
        }
        Ok(())
    }

    /// Fetches a service together with its failover policy (and, for each
    /// failover destination, the destination service and its destination
    /// policy) and its own destination policy. Returns false if the service
    /// does not exist.
    async fn load_service_and_policies(&mut self, service_key: &RefKey) -> Result<bool, StoreError> {
        if self.loaded_services.contains(service_key) {
            return Ok(self.related.services.contains_key(service_key));
        }
        self.loaded_services.insert(service_key.clone());

        let Some(service) = self.store.get(service_key).await? else {
            return Ok(false);
        };
        self.related.add_resource(service);

        let failover_key = service_key.with_kind(ResourceKind::FailoverPolicy);
        if let Some(failover) = self.store.get(&failover_key).await? {
            self.mapper
                .track_failover_policy(&failover.meta.id, failover.as_failover_policy());

            let destinations: Vec<RefKey> = failover
                .as_failover_policy()
                .destination_service_refs()
                .map(service_ref_key)
                .collect();
            self.related.add_resource(failover);

            for dest_key in destinations {
                if self.related.services.contains_key(&dest_key) {
                    continue;
                }
                if let Some(dest_service) = self.store.get(&dest_key).await? {
                    self.related.add_resource(dest_service);
                    let dest_policy_key = dest_key.with_kind(ResourceKind::DestinationPolicy);
                    if let Some(dest_policy) = self.store.get(&dest_policy_key).await? {
                        self.related.add_resource(dest_policy);
                    }
                }
            }
        }

        let policy_key = service_key.with_kind(ResourceKind::DestinationPolicy);
        if let Some(policy) = self.store.get(&policy_key).await? {
            self.related.add_resource(policy);
        }

        Ok(true)
    }
}

fn service_ref_key(reference: &Ref) -> RefKey {
    reference.key().with_kind(ResourceKind::Service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fixtures, MemStore};
    use mesh_routes_controller_core::{Protocol, Tenancy};
    use pretty_assertions::assert_eq;

    fn key(kind: ResourceKind, name: &str) -> RefKey {
        RefKey::new(kind, Tenancy::default(), name)
    }

    #[tokio::test]
    async fn absent_service_yields_only_the_seed() {
        let store = MemStore::new();
        let mapper = XRouteMapper::new();

        let related = load_resources_for_computed_routes(
            &store,
            &mapper,
            key(ResourceKind::ComputedRoutes, "api").to_id(),
        )
        .await
        .unwrap();

        assert_eq!(related.computed_routes_ids().len(), 1);
        assert!(related.service(&key(ResourceKind::Service, "api")).is_none());
    }

    #[tokio::test]
    async fn loads_service_policies_and_bound_routes() {
        let store = MemStore::new();
        let mapper = XRouteMapper::new();

        store.insert(fixtures::service("api", &[("http", Protocol::Http), ("mesh", Protocol::Mesh)]));
        store.insert(fixtures::service("www", &[("http", Protocol::Http), ("mesh", Protocol::Mesh)]));
        store.insert(fixtures::destination_policy("api", &["http"]));
        store.insert(fixtures::failover_policy("api", "http", &["www"]));

        let route = store.insert(fixtures::http_route("api-route", &[("api", None)], &["www"]));
        mapper.track_xroute(&route.meta.id, route.as_xroute());

        let related = load_resources_for_computed_routes(
            &store,
            &mapper,
            key(ResourceKind::ComputedRoutes, "api").to_id(),
        )
        .await
        .unwrap();

        assert!(related.service(&key(ResourceKind::Service, "api")).is_some());
        assert!(related.service(&key(ResourceKind::Service, "www")).is_some());
        assert!(related
            .failover_policy(&key(ResourceKind::FailoverPolicy, "api"))
            .is_some());
        assert!(related
            .destination_policy(&key(ResourceKind::DestinationPolicy, "api"))
            .is_some());

        let bound = related.routes_bound_to(&key(ResourceKind::Service, "api"));
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].meta.id.name, "api-route");
    }

    #[tokio::test]
    async fn multi_parent_route_discovers_co_bound_services() {
        let store = MemStore::new();
        let mapper = XRouteMapper::new();

        store.insert(fixtures::service("api", &[("http", Protocol::Http), ("mesh", Protocol::Mesh)]));
        store.insert(fixtures::service("foo", &[("http", Protocol::Http), ("mesh", Protocol::Mesh)]));

        let route = store.insert(fixtures::http_route(
            "shared-route",
            &[("api", None), ("foo", None)],
            &["api"],
        ));
        mapper.track_xroute(&route.meta.id, route.as_xroute());

        let related = load_resources_for_computed_routes(
            &store,
            &mapper,
            key(ResourceKind::ComputedRoutes, "api").to_id(),
        )
        .await
        .unwrap();

        let mut names: Vec<&str> = related
            .computed_routes_ids()
            .iter()
            .map(|id| id.name.as_str())
            .collect();
        names.sort();
        assert_eq!(names, vec!["api", "foo"]);

        // the route is indexed under both parents
        assert_eq!(related.routes_bound_to(&key(ResourceKind::Service, "api")).len(), 1);
        assert_eq!(related.routes_bound_to(&key(ResourceKind::Service, "foo")).len(), 1);
    }

    #[tokio::test]
    async fn first_write_wins_per_reference_key() {
        let mut related = RelatedResources::new();
        let first = fixtures::service("api", &[("http", Protocol::Http)]);
        let mut second = fixtures::service("api", &[("tcp", Protocol::Tcp)]);
        second.meta.version = mesh_routes_controller_core::Version("9".to_string());

        related.add_resource(first.clone());
        related.add_resource(second);

        let got = related.service(&key(ResourceKind::Service, "api")).unwrap();
        assert_eq!(got.meta.version, first.meta.version);
        assert_eq!(got.as_service(), first.as_service());
    }
}
