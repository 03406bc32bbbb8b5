use crate::reference::Ref;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

/// Where traffic for a port shifts when the primary target is unavailable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverDestination {
    pub service: Ref,
    pub port: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverConfig {
    pub destinations: Vec<FailoverDestination>,
}

/// Computed failover policy, name-aligned with a service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverPolicy {
    pub port_configs: BTreeMap<String, FailoverConfig>,
}

impl FailoverPolicy {
    /// Every destination service referenced anywhere in the policy.
    pub fn destination_service_refs(&self) -> impl Iterator<Item = &Ref> {
        self.port_configs
            .values()
            .flat_map(|config| config.destinations.iter().map(|dest| &dest.service))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadBalancer {
    RoundRobin,
    Random,
    LeastRequest { choice_count: u32 },
    RingHash { ring_size: u64 },
    Maglev,
}

/// Per-port destination traffic configuration, attached verbatim to each
/// resolved target by the compiler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub load_balancer: Option<LoadBalancer>,
}

/// Destination policy, name-aligned with a service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPolicy {
    pub port_configs: BTreeMap<String, DestinationConfig>,
}
