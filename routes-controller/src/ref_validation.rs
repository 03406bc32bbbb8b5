use crate::{loader::RelatedResources, pending_status::PendingStatuses};
use mesh_routes_controller_core::{
    Condition, Protocol, Ref, Resource, ResourceKind, Service,
};

/// Checks every parent and backend service reference of every loaded route
/// against the snapshot. Problems become status conditions on the route;
/// compilation proceeds regardless and null-routes what validation flagged.
pub fn validate_xroute_references(related: &RelatedResources, pending: &mut PendingStatuses) {
    for route in related.all_routes() {
        validate_route(related, route, pending);
    }
}

fn validate_route(related: &RelatedResources, route: &Resource, pending: &mut PendingStatuses) {
    let xroute = route.as_xroute();

    for parent in xroute.parent_refs() {
        let outcome = check_service_ref(related, &parent.service, parent.port.as_deref());
        let condition = match outcome {
            RefOutcome::Ok => continue,
            RefOutcome::Missing => Condition::MissingParentRef {
                reference: parent.service.clone(),
            },
            RefOutcome::OutsideMesh => Condition::ParentRefOutsideMesh {
                reference: parent.service.clone(),
            },
            RefOutcome::UnknownPort(port) => Condition::UnknownParentRefPort {
                reference: parent.service.clone(),
                port,
            },
            RefOutcome::MeshPort(port) => Condition::ParentRefUsingMeshPort {
                reference: parent.service.clone(),
                port,
            },
        };
        pending.add(route.meta.id.clone(), condition);
    }

    for backend in xroute.backend_refs() {
        let outcome = check_service_ref(related, &backend.service, backend.port.as_deref());
        let condition = match outcome {
            RefOutcome::Ok => continue,
            RefOutcome::Missing => Condition::MissingBackendRef {
                reference: backend.service.clone(),
            },
            RefOutcome::OutsideMesh => Condition::BackendRefOutsideMesh {
                reference: backend.service.clone(),
            },
            RefOutcome::UnknownPort(port) => Condition::UnknownBackendRefPort {
                reference: backend.service.clone(),
                port,
            },
            RefOutcome::MeshPort(port) => Condition::BackendRefUsingMeshPort {
                reference: backend.service.clone(),
                port,
            },
        };
        pending.add(route.meta.id.clone(), condition);
    }
}

enum RefOutcome {
    Ok,
    Missing,
    OutsideMesh,
    UnknownPort(String),
    MeshPort(String),
}

/// An empty port is always acceptable here: parent wildcards expand at
/// compile time and backend ports default to the compiled port.
fn check_service_ref(related: &RelatedResources, reference: &Ref, port: Option<&str>) -> RefOutcome {
    let key = reference.key().with_kind(ResourceKind::Service);
    let Some(res) = related.service(&key) else {
        return RefOutcome::Missing;
    };
    let service: &Service = res.as_service();
    if !service.is_mesh_enabled() {
        return RefOutcome::OutsideMesh;
    }
    let Some(port) = port else {
        return RefOutcome::Ok;
    };
    match service.port(port) {
        None => RefOutcome::UnknownPort(port.to_string()),
        Some(sp) if sp.protocol == Protocol::Mesh => RefOutcome::MeshPort(port.to_string()),
        Some(_) => RefOutcome::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixtures;
    use mesh_routes_controller_core::Protocol;
    use pretty_assertions::assert_eq;

    fn related_with(resources: Vec<mesh_routes_controller_core::Resource>) -> RelatedResources {
        let mut related = RelatedResources::new();
        for res in resources {
            related.add_resource(res);
        }
        related
    }

    #[test]
    fn valid_references_produce_no_conditions() {
        let related = related_with(vec![
            fixtures::service("api", &[("http", Protocol::Http), ("mesh", Protocol::Mesh)]),
            fixtures::http_route("api-route", &[("api", Some("http"))], &["api"]),
        ]);

        let mut pending = PendingStatuses::default();
        validate_xroute_references(&related, &mut pending);
        assert!(pending.is_empty());
    }

    #[test]
    fn missing_parent_and_backend_are_flagged() {
        let route = fixtures::http_route("orphan", &[("ghost", None)], &["phantom"]);
        let route_id = route.meta.id.clone();
        let related = related_with(vec![route]);

        let mut pending = PendingStatuses::default();
        validate_xroute_references(&related, &mut pending);

        assert_eq!(
            pending.conditions_for(&route_id),
            &[
                Condition::MissingParentRef {
                    reference: fixtures::svc_ref("ghost"),
                },
                Condition::MissingBackendRef {
                    reference: fixtures::svc_ref("phantom"),
                },
            ]
        );
    }

    #[test]
    fn service_without_mesh_port_is_outside_the_mesh() {
        let route = fixtures::http_route("api-route", &[("api", None)], &[]);
        let route_id = route.meta.id.clone();
        let related = related_with(vec![
            fixtures::service("api", &[("http", Protocol::Http)]),
            route,
        ]);

        let mut pending = PendingStatuses::default();
        validate_xroute_references(&related, &mut pending);

        assert_eq!(
            pending.conditions_for(&route_id),
            &[Condition::ParentRefOutsideMesh {
                reference: fixtures::svc_ref("api"),
            }]
        );
    }

    #[test]
    fn named_ports_are_checked_against_the_service() {
        let route = fixtures::http_route("api-route", &[("api", Some("grpc"))], &["api"]);
        let route_id = route.meta.id.clone();
        let related = related_with(vec![
            fixtures::service("api", &[("http", Protocol::Http), ("mesh", Protocol::Mesh)]),
            route,
        ]);

        let mut pending = PendingStatuses::default();
        validate_xroute_references(&related, &mut pending);

        assert_eq!(
            pending.conditions_for(&route_id),
            &[Condition::UnknownParentRefPort {
                reference: fixtures::svc_ref("api"),
                port: "grpc".to_string(),
            }]
        );
    }

    #[test]
    fn mesh_port_references_are_rejected() {
        let route = fixtures::tcp_route("api-route", &[("api", Some("mesh"))], &["api"]);
        let route_id = route.meta.id.clone();
        let related = related_with(vec![
            fixtures::service("api", &[("tcp", Protocol::Tcp), ("mesh", Protocol::Mesh)]),
            route,
        ]);

        let mut pending = PendingStatuses::default();
        validate_xroute_references(&related, &mut pending);

        assert_eq!(
            pending.conditions_for(&route_id),
            &[Condition::ParentRefUsingMeshPort {
                reference: fixtures::svc_ref("api"),
                port: "mesh".to_string(),
            }]
        );
    }

    #[test]
    fn wildcard_parent_port_is_not_a_port_error() {
        let route = fixtures::http_route("api-route", &[("api", None)], &["api"]);
        let related = related_with(vec![
            fixtures::service("api", &[("http", Protocol::Http), ("mesh", Protocol::Mesh)]),
            route,
        ]);

        let mut pending = PendingStatuses::default();
        validate_xroute_references(&related, &mut pending);
        assert!(pending.is_empty());
    }
}
