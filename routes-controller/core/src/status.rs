use crate::reference::{Ref, ResourceKind, Stamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A status condition attached to the resource that authored a problematic
/// reference. Reference problems are never errors; the computation proceeds
/// with degraded (null-routed) behavior and operators observe the problem
/// here.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    /// Every reference resolved and every parent accepted the route.
    /// Published on each clean reconciliation; overwrites whatever error
    /// conditions a previous cycle left behind.
    Accepted,
    MissingParentRef {
        reference: Ref,
    },
    MissingBackendRef {
        reference: Ref,
    },
    ParentRefOutsideMesh {
        reference: Ref,
    },
    BackendRefOutsideMesh {
        reference: Ref,
    },
    UnknownParentRefPort {
        reference: Ref,
        port: String,
    },
    UnknownBackendRefPort {
        reference: Ref,
        port: String,
    },
    ParentRefUsingMeshPort {
        reference: Ref,
        port: String,
    },
    BackendRefUsingMeshPort {
        reference: Ref,
        port: String,
    },
    /// The port already accepted a route of a different type; this route is
    /// not bound to that parent.
    ConflictNotBoundToParentRef {
        parent_ref: Ref,
        port: String,
        accepted_kind: ResourceKind,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "route is valid"),
            Self::MissingParentRef { reference } => {
                write!(f, "parent ref {reference} does not exist")
            }
            Self::MissingBackendRef { reference } => {
                write!(f, "backend ref {reference} does not exist")
            }
            Self::ParentRefOutsideMesh { reference } => {
                write!(f, "parent ref {reference} does not participate in the mesh")
            }
            Self::BackendRefOutsideMesh { reference } => {
                write!(f, "backend ref {reference} does not participate in the mesh")
            }
            Self::UnknownParentRefPort { reference, port } => {
                write!(f, "parent ref {reference} has no port named {port:?}")
            }
            Self::UnknownBackendRefPort { reference, port } => {
                write!(f, "backend ref {reference} has no port named {port:?}")
            }
            Self::ParentRefUsingMeshPort { reference, port } => {
                write!(f, "parent ref {reference} port {port:?} is the mesh port")
            }
            Self::BackendRefUsingMeshPort { reference, port } => {
                write!(f, "backend ref {reference} port {port:?} is the mesh port")
            }
            Self::ConflictNotBoundToParentRef {
                parent_ref,
                port,
                accepted_kind,
            } => write!(
                f,
                "route is not bound to {parent_ref} port {port:?}: port already accepted a {accepted_kind}"
            ),
        }
    }
}

/// A status published for one resource under one controller key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub observed_generation: Stamp,
    pub conditions: Vec<Condition>,
}
