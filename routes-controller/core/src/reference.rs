use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The resource types that participate in routing resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Service,
    HttpRoute,
    GrpcRoute,
    TcpRoute,
    FailoverPolicy,
    DestinationPolicy,
    ComputedRoutes,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "Service",
            Self::HttpRoute => "HTTPRoute",
            Self::GrpcRoute => "GRPCRoute",
            Self::TcpRoute => "TCPRoute",
            Self::FailoverPolicy => "FailoverPolicy",
            Self::DestinationPolicy => "DestinationPolicy",
            Self::ComputedRoutes => "ComputedRoutes",
        }
    }

    pub fn is_xroute(&self) -> bool {
        matches!(self, Self::HttpRoute | Self::GrpcRoute | Self::TcpRoute)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenancy of a resource. Empty components normalize to `"default"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tenancy {
    pub partition: String,
    pub namespace: String,
}

impl Tenancy {
    pub fn new(partition: impl Into<String>, namespace: impl Into<String>) -> Self {
        fn normalize(s: String) -> String {
            if s.is_empty() {
                "default".to_string()
            } else {
                s
            }
        }
        Self {
            partition: normalize(partition.into()),
            namespace: normalize(namespace.into()),
        }
    }
}

impl Default for Tenancy {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl fmt::Display for Tenancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.partition, self.namespace)
    }
}

/// A reference to a resource, optionally scoped to a section of it.
///
/// `section` is only ever populated on xRoute parent/backend bindings;
/// service references never carry one.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub kind: ResourceKind,
    pub tenancy: Tenancy,
    pub name: String,
    pub section: Option<String>,
}

impl Ref {
    pub fn new(kind: ResourceKind, tenancy: Tenancy, name: impl Into<String>) -> Self {
        Self {
            kind,
            tenancy,
            name: name.into(),
            section: None,
        }
    }

    /// The deduplicating index key: this reference minus its section.
    pub fn key(&self) -> RefKey {
        RefKey {
            kind: self.kind,
            tenancy: self.tenancy.clone(),
            name: self.name.clone(),
        }
    }

    /// Derives the name-aligned reference of another kind.
    pub fn with_kind(&self, kind: ResourceKind) -> Ref {
        Ref {
            kind,
            tenancy: self.tenancy.clone(),
            name: self.name.clone(),
            section: None,
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.tenancy, self.name)?;
        if let Some(section) = &self.section {
            write!(f, "?section={section}")?;
        }
        Ok(())
    }
}

/// A reference minus its section; several sections of one object share a key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefKey {
    pub kind: ResourceKind,
    pub tenancy: Tenancy,
    pub name: String,
}

impl RefKey {
    pub fn new(kind: ResourceKind, tenancy: Tenancy, name: impl Into<String>) -> Self {
        Self {
            kind,
            tenancy,
            name: name.into(),
        }
    }

    /// Derives the name-aligned key of another kind.
    pub fn with_kind(&self, kind: ResourceKind) -> RefKey {
        RefKey {
            kind,
            tenancy: self.tenancy.clone(),
            name: self.name.clone(),
        }
    }

    pub fn to_ref(&self) -> Ref {
        Ref {
            kind: self.kind,
            tenancy: self.tenancy.clone(),
            name: self.name.clone(),
            section: None,
        }
    }

    /// An identifier for this key with no storage uid attached.
    pub fn to_id(&self) -> Id {
        Id {
            kind: self.kind,
            tenancy: self.tenancy.clone(),
            name: self.name.clone(),
            uid: String::new(),
        }
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.tenancy, self.name)
    }
}

/// A storage identifier. The uid is storage-assigned; the logical key used
/// for graph edges is kind+tenancy+name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id {
    pub kind: ResourceKind,
    pub tenancy: Tenancy,
    pub name: String,
    pub uid: String,
}

impl Id {
    pub fn key(&self) -> RefKey {
        RefKey {
            kind: self.kind,
            tenancy: self.tenancy.clone(),
            name: self.name.clone(),
        }
    }

    pub fn to_ref(&self) -> Ref {
        self.key().to_ref()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.tenancy, self.name)
    }
}

/// Storage version, compared exactly on CAS writes and deletes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(pub String);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monotonically increasing, globally sortable generation stamp.
///
/// Ordering compares the embedded wall clock numerically, then the counter
/// that disambiguates stamps minted within the same instant.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub wall: DateTime<Utc>,
    pub counter: u64,
}

impl Stamp {
    pub fn new(wall: DateTime<Utc>, counter: u64) -> Self {
        Self { wall, counter }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tenancy_normalizes_empty_components() {
        let tenancy = Tenancy::new("", "");
        assert_eq!(tenancy.partition, "default");
        assert_eq!(tenancy.namespace, "default");

        let tenancy = Tenancy::new("ap1", "");
        assert_eq!(tenancy.partition, "ap1");
        assert_eq!(tenancy.namespace, "default");
    }

    #[test]
    fn ref_key_drops_section() {
        let mut r = Ref::new(ResourceKind::Service, Tenancy::default(), "api");
        r.section = Some("unused".to_string());
        let key = r.key();
        assert_eq!(key, RefKey::new(ResourceKind::Service, Tenancy::default(), "api"));
    }

    #[test]
    fn name_aligned_derivation() {
        let svc = RefKey::new(ResourceKind::Service, Tenancy::default(), "api");
        let cr = svc.with_kind(ResourceKind::ComputedRoutes);
        assert_eq!(cr.name, "api");
        assert_eq!(cr.tenancy, svc.tenancy);
        assert_eq!(cr.kind, ResourceKind::ComputedRoutes);
    }

    #[test]
    fn stamp_orders_by_wall_clock_then_counter() {
        let early = Stamp::new(Utc.timestamp_opt(100, 0).unwrap(), 5);
        let later = Stamp::new(Utc.timestamp_opt(200, 0).unwrap(), 0);
        assert!(early < later);

        let a = Stamp::new(Utc.timestamp_opt(100, 0).unwrap(), 1);
        let b = Stamp::new(Utc.timestamp_opt(100, 0).unwrap(), 2);
        assert!(a < b);
    }
}
