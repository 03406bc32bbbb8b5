use crate::loader::RelatedResources;
use ahash::AHashMap as HashMap;
use mesh_routes_controller_core::{
    Condition, Id, ResourceStore, Status, StoreError, ROUTES_CONTROLLER_NAME,
};

/// Conditions accumulated during one compute cycle, keyed by the resource
/// that authored the offending reference. Flushed after validation and
/// compilation both had their say: one status write per loaded route, with
/// an `Accepted` condition standing in where nothing was flagged so that a
/// stale error is withdrawn the cycle its cause is fixed.
#[derive(Debug, Default)]
pub struct PendingStatuses {
    statuses: HashMap<Id, Vec<Condition>>,
}

impl PendingStatuses {
    pub fn add(&mut self, id: Id, condition: Condition) {
        tracing::debug!(resource = %id, %condition, "recording status condition");
        self.statuses.entry(id).or_default().push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn conditions_for(&self, id: &Id) -> &[Condition] {
        self.statuses.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One CAS status write per loaded route, in any order. A conflict means
    /// the route was edited concurrently; the error surfaces so the next
    /// reconciliation retries.
    pub async fn flush(
        mut self,
        store: &dyn ResourceStore,
        related: &RelatedResources,
    ) -> Result<(), StoreError> {
        for route in related.all_routes() {
            let mut conditions = self.statuses.remove(&route.meta.id).unwrap_or_default();
            if conditions.is_empty() {
                conditions.push(Condition::Accepted);
            } else {
                conditions.sort();
                conditions.dedup();
            }

            let status = Status {
                observed_generation: route.meta.generation.clone(),
                conditions,
            };
            store
                .write_status(&route.meta.id, &route.meta.version, ROUTES_CONTROLLER_NAME, status)
                .await?;
        }

        // conditions only attach to loaded routes
        for (id, _) in self.statuses {
            tracing::warn!(resource = %id, "skipping status write: resource not in snapshot");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fixtures, MemStore};

    #[tokio::test]
    async fn concurrent_edit_surfaces_a_version_conflict() {
        let store = MemStore::new();
        let stale = store.insert(fixtures::http_route("api-route", &[("api", None)], &["www"]));
        // the route is edited again after this cycle loaded it
        store.insert(fixtures::http_route("api-route", &[("api", None)], &["www"]));

        let mut related = RelatedResources::new();
        related.add_resource(stale.clone());

        let mut pending = PendingStatuses::default();
        pending.add(
            stale.meta.id.clone(),
            Condition::MissingBackendRef {
                reference: fixtures::svc_ref("www"),
            },
        );

        let err = pending.flush(&store, &related).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn flush_publishes_accepted_for_clean_routes() {
        let store = MemStore::new();
        let route = store.insert(fixtures::http_route("api-route", &[("api", None)], &["api"]));

        let mut related = RelatedResources::new();
        related.add_resource(route.clone());

        PendingStatuses::default()
            .flush(&store, &related)
            .await
            .unwrap();

        let status = store.status_of(&route.meta.id.key()).unwrap();
        assert_eq!(status.observed_generation, route.meta.generation);
        assert_eq!(status.conditions, vec![Condition::Accepted]);
    }
}
