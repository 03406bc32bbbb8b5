use serde::{Deserialize, Serialize};

/// Port protocol. `Mesh` is the reserved marker for the sidecar listener;
/// every other protocol is user-routable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Http,
    Http2,
    Grpc,
    Mesh,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub target_port: String,
    pub protocol: Protocol,
}

/// A mesh service: an ordered set of named ports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub ports: Vec<ServicePort>,
}

impl Service {
    pub fn new(ports: Vec<ServicePort>) -> Self {
        Self { ports }
    }

    pub fn port(&self, name: &str) -> Option<&ServicePort> {
        self.ports.iter().find(|p| p.target_port == name)
    }

    /// A service participates in the mesh iff it exposes a mesh port.
    pub fn is_mesh_enabled(&self) -> bool {
        self.ports.iter().any(|p| p.protocol == Protocol::Mesh)
    }

    pub fn mesh_port(&self) -> Option<&str> {
        self.ports
            .iter()
            .find(|p| p.protocol == Protocol::Mesh)
            .map(|p| p.target_port.as_str())
    }

    /// The user-routable ports, in declared order.
    pub fn routable_ports(&self) -> impl Iterator<Item = &ServicePort> {
        self.ports.iter().filter(|p| p.protocol != Protocol::Mesh)
    }
}
