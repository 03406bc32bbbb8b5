use crate::{
    reference::{Id, RefKey, Version},
    resource::Resource,
    status::Status,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A CAS write, delete, or status write lost to a concurrent edit. The
    /// input graph has already changed again; the external reconciler
    /// retries the whole cycle.
    #[error("version conflict on {id}: expected version {expected}")]
    VersionConflict { id: Id, expected: Version },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The external resource store this core consumes. Fetches are blocking
/// calls from the caller's perspective; retries and deadlines belong to the
/// external reconciliation scheduler, not to implementations of this trait.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// `None` means not-found, which is recorded absence, not an error.
    async fn get(&self, key: &RefKey) -> Result<Option<Resource>, StoreError>;

    /// Compare-and-swap on `resource.meta.version`; an empty version means
    /// create.
    async fn write(&self, resource: Resource) -> Result<Version, StoreError>;

    /// Compare-and-swap delete keyed on the previously observed version.
    async fn delete(&self, id: &Id, expected: &Version) -> Result<(), StoreError>;

    /// Writes one status block under `key`, compare-and-swapped against the
    /// version observed when the resource was loaded.
    async fn write_status(
        &self,
        id: &Id,
        expected: &Version,
        key: &str,
        status: Status,
    ) -> Result<(), StoreError>;
}
