//! In-memory resource store and resource builders shared by the crate's
//! tests.

use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mesh_routes_controller_core::{
    Id, RefKey, Resource, ResourceStore, Stamp, Status, StoreError, Version,
    ROUTES_CONTROLLER_NAME,
};
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    resources: HashMap<RefKey, Resource>,
    statuses: HashMap<(RefKey, String), Status>,
    seq: u64,
    writes: usize,
}

impl State {
    /// Stores the resource with a fresh version and generation stamp,
    /// keeping (or minting) its storage uid. Insertion order doubles as
    /// creation-age order.
    fn admit(&mut self, mut res: Resource) -> Resource {
        self.seq += 1;
        let key = res.meta.id.key();
        if res.meta.id.uid.is_empty() {
            res.meta.id.uid = format!("uid-{}", self.seq);
        }
        res.meta.version = Version(self.seq.to_string());
        res.meta.generation = Stamp::new(
            Utc.timestamp_opt(1_700_000_000 + self.seq as i64, 0).unwrap(),
            0,
        );
        self.resources.insert(key, res.clone());
        res
    }
}

/// A CAS-checking in-memory store.
pub struct MemStore {
    state: Mutex<State>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Seeds a resource directly, bypassing the CAS check. Returns the
    /// stored copy (with its assigned uid, version, and generation).
    pub fn insert(&self, res: Resource) -> Resource {
        self.state.lock().admit(res)
    }

    pub fn resource(&self, key: &RefKey) -> Option<Resource> {
        self.state.lock().resources.get(key).cloned()
    }

    pub fn status_of(&self, key: &RefKey) -> Option<Status> {
        self.state
            .lock()
            .statuses
            .get(&(key.clone(), ROUTES_CONTROLLER_NAME.to_string()))
            .cloned()
    }

    /// CAS writes admitted so far (excluding `insert` seeding).
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

#[async_trait]
impl ResourceStore for MemStore {
    async fn get(&self, key: &RefKey) -> Result<Option<Resource>, StoreError> {
        Ok(self.state.lock().resources.get(key).cloned())
    }

    async fn write(&self, resource: Resource) -> Result<Version, StoreError> {
        let mut state = self.state.lock();
        let key = resource.meta.id.key();
        match state.resources.get(&key) {
            Some(existing) if existing.meta.version != resource.meta.version => {
                return Err(StoreError::VersionConflict {
                    id: resource.meta.id.clone(),
                    expected: resource.meta.version.clone(),
                });
            }
            None if !resource.meta.version.0.is_empty() => {
                return Err(StoreError::VersionConflict {
                    id: resource.meta.id.clone(),
                    expected: resource.meta.version.clone(),
                });
            }
            _ => {}
        }
        state.writes += 1;
        let stored = state.admit(resource);
        Ok(stored.meta.version)
    }

    async fn delete(&self, id: &Id, expected: &Version) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let key = id.key();
        match state.resources.get(&key) {
            None => Ok(()),
            Some(existing) if existing.meta.version == *expected => {
                state.resources.remove(&key);
                Ok(())
            }
            Some(_) => Err(StoreError::VersionConflict {
                id: id.clone(),
                expected: expected.clone(),
            }),
        }
    }

    async fn write_status(
        &self,
        id: &Id,
        expected: &Version,
        key: &str,
        status: Status,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let res_key = id.key();
        let Some(existing) = state.resources.get(&res_key) else {
            return Err(StoreError::Other(anyhow::anyhow!(
                "status write for unknown resource {id}"
            )));
        };
        if existing.meta.version != *expected {
            return Err(StoreError::VersionConflict {
                id: id.clone(),
                expected: expected.clone(),
            });
        }
        state.statuses.insert((res_key, key.to_string()), status);
        Ok(())
    }
}

pub mod fixtures {
    use chrono::{TimeZone, Utc};
    use mesh_routes_controller_core::{
        policy::{
            DestinationConfig, DestinationPolicy, FailoverConfig, FailoverDestination,
            FailoverPolicy,
        },
        xroute::{
            GrpcRoute, GrpcRouteRule, HttpRoute, HttpRouteMatch, HttpRouteRule, PathMatch,
            TcpRoute, TcpRouteRule,
        },
        BackendRef, Id, Meta, ParentRef, Payload, Protocol, Ref, Resource, ResourceKind, Service,
        ServicePort, Stamp, Tenancy, Version,
    };
    use std::time::Duration;

    pub fn meta(kind: ResourceKind, name: &str) -> Meta {
        Meta {
            id: Id {
                kind,
                tenancy: Tenancy::default(),
                name: name.to_string(),
                uid: String::new(),
            },
            version: Version("1".to_string()),
            generation: Stamp::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), 0),
            owner: None,
        }
    }

    pub fn svc_ref(name: &str) -> Ref {
        Ref::new(ResourceKind::Service, Tenancy::default(), name)
    }

    pub fn parent_refs(parents: &[(&str, Option<&str>)]) -> Vec<ParentRef> {
        parents
            .iter()
            .map(|(name, port)| ParentRef::new(svc_ref(name), port.map(str::to_string)))
            .collect()
    }

    pub fn backend_refs(backends: &[&str]) -> Vec<BackendRef> {
        backends
            .iter()
            .map(|name| BackendRef::new(svc_ref(name), None, 1))
            .collect()
    }

    pub fn service(name: &str, ports: &[(&str, Protocol)]) -> Resource {
        Resource {
            meta: meta(ResourceKind::Service, name),
            payload: Payload::Service(Service::new(
                ports
                    .iter()
                    .map(|(port, protocol)| ServicePort {
                        target_port: port.to_string(),
                        protocol: *protocol,
                    })
                    .collect(),
            )),
        }
    }

    pub fn http_route(name: &str, parents: &[(&str, Option<&str>)], backends: &[&str]) -> Resource {
        Resource {
            meta: meta(ResourceKind::HttpRoute, name),
            payload: Payload::HttpRoute(HttpRoute {
                parent_refs: parent_refs(parents),
                rules: vec![HttpRouteRule {
                    matches: vec![HttpRouteMatch {
                        path: Some(PathMatch::Prefix("/".to_string())),
                        ..Default::default()
                    }],
                    backend_refs: backend_refs(backends),
                    ..Default::default()
                }],
            }),
        }
    }

    pub fn grpc_route(name: &str, parents: &[(&str, Option<&str>)], backends: &[&str]) -> Resource {
        Resource {
            meta: meta(ResourceKind::GrpcRoute, name),
            payload: Payload::GrpcRoute(GrpcRoute {
                parent_refs: parent_refs(parents),
                rules: vec![GrpcRouteRule {
                    backend_refs: backend_refs(backends),
                    ..Default::default()
                }],
            }),
        }
    }

    pub fn tcp_route(name: &str, parents: &[(&str, Option<&str>)], backends: &[&str]) -> Resource {
        Resource {
            meta: meta(ResourceKind::TcpRoute, name),
            payload: Payload::TcpRoute(TcpRoute {
                parent_refs: parent_refs(parents),
                rules: vec![TcpRouteRule {
                    backend_refs: backend_refs(backends),
                }],
            }),
        }
    }

    pub fn failover_policy(name: &str, port: &str, destinations: &[&str]) -> Resource {
        let config = FailoverConfig {
            destinations: destinations
                .iter()
                .map(|dest| FailoverDestination {
                    service: svc_ref(dest),
                    port: None,
                })
                .collect(),
        };
        Resource {
            meta: meta(ResourceKind::FailoverPolicy, name),
            payload: Payload::FailoverPolicy(FailoverPolicy {
                port_configs: [(port.to_string(), config)].into_iter().collect(),
            }),
        }
    }

    pub fn destination_policy(name: &str, ports: &[&str]) -> Resource {
        Resource {
            meta: meta(ResourceKind::DestinationPolicy, name),
            payload: Payload::DestinationPolicy(DestinationPolicy {
                port_configs: ports
                    .iter()
                    .map(|port| {
                        (
                            port.to_string(),
                            DestinationConfig {
                                connect_timeout: Some(Duration::from_secs(5)),
                                ..Default::default()
                            },
                        )
                    })
                    .collect(),
            }),
        }
    }
}
