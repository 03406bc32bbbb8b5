use crate::{
    generate::{generate_computed_routes, ComputedRoutesResult},
    loader::load_resources_for_computed_routes,
    pending_status::PendingStatuses,
    ref_validation::validate_xroute_references,
};
use chrono::Utc;
use mesh_routes_controller_core::{
    Id, Meta, Payload, Resource, ResourceStore, Stamp, StoreError,
};
use mesh_routes_controller_mapper::XRouteMapper;

/// One full reconciliation of a ComputedRoutes request: load the resource
/// graph, validate references, compile, persist outputs, publish statuses.
///
/// A multi-parent route can pull sibling services into the snapshot; their
/// ComputedRoutes are regenerated in the same pass so all outputs agree on
/// one view of the world.
pub async fn reconcile_computed_routes(
    store: &dyn ResourceStore,
    mapper: &XRouteMapper,
    request: Id,
) -> Result<(), StoreError> {
    tracing::debug!(resource = %request, "reconciling computed routes");

    let related = load_resources_for_computed_routes(store, mapper, request).await?;

    let mut pending = PendingStatuses::default();
    validate_xroute_references(&related, &mut pending);
    let results = generate_computed_routes(&related, &mut pending);

    for result in results {
        persist(store, mapper, result).await?;
    }

    pending.flush(store, &related).await
}

/// CAS-writes one output, skipping writes whose payload is unchanged so a
/// steady-state reconciliation is a no-op. `data: None` deletes.
async fn persist(
    store: &dyn ResourceStore,
    mapper: &XRouteMapper,
    result: ComputedRoutesResult,
) -> Result<(), StoreError> {
    let key = result.id.key();
    let existing = store.get(&key).await?;

    let Some(data) = result.data else {
        if let Some(existing) = existing {
            tracing::info!(resource = %existing.meta.id, "deleting computed routes");
            store
                .delete(&existing.meta.id, &existing.meta.version)
                .await?;
            mapper.untrack_computed_routes(&existing.meta.id);
        }
        return Ok(());
    };

    if let Some(existing) = &existing {
        if *existing.as_computed_routes() == data {
            tracing::trace!(resource = %existing.meta.id, "computed routes unchanged");
            mapper.track_computed_routes(&existing.meta.id, &data);
            return Ok(());
        }
    }

    let (id, version) = match existing {
        Some(existing) => (existing.meta.id, existing.meta.version),
        None => (result.id, Default::default()),
    };
    let resource = Resource {
        meta: Meta {
            id: id.clone(),
            version,
            generation: Stamp::new(Utc::now(), 0),
            owner: result.owner,
        },
        payload: Payload::ComputedRoutes(data.clone()),
    };
    let new_version = store.write(resource).await?;
    tracing::info!(resource = %id, version = %new_version, "wrote computed routes");
    mapper.track_computed_routes(&id, &data);
    Ok(())
}
