//! Peer-service views.
//!
//! Peer discovery is an external collaborator; the engine only sees the
//! membership it reports. [`PeerView`] is the seam: scrape-target
//! providers expose named service groups, simpler peers expose a flat
//! list of fully-qualified targets.

use serde::{Deserialize, Deserializer, Serialize};

/// One unit of a related peer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPort {
    pub hostname: String,
    /// Kept textual: discovery transports deliver ports as strings or
    /// numbers and the engine only ever formats them back into
    /// `host:port` targets.
    #[serde(deserialize_with = "port_text")]
    pub port: String,
}

impl HostPort {
    /// `host:port` target string.
    pub fn target(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

fn port_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// A named peer service and its member units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroup {
    pub service_name: String,
    pub hosts: Vec<HostPort>,
}

/// What the engine can ask of a discovered peer relation.
pub trait PeerView {
    /// Member services with their units, in discovery iteration order.
    fn list_services(&self) -> Vec<ServiceGroup>;

    /// All units flattened to `host:port` target strings.
    fn list_targets(&self) -> Vec<String> {
        self.list_services()
            .iter()
            .flat_map(|service| service.hosts.iter().map(HostPort::target))
            .collect()
    }
}

/// A plain data snapshot of a peer relation, e.g. deserialized from the
/// discovery transport's JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationSnapshot {
    pub services: Vec<ServiceGroup>,
}

impl RelationSnapshot {
    /// Snapshot of a single service, mainly for tests.
    pub fn single(service_name: &str, hosts: &[(&str, &str)]) -> Self {
        Self {
            services: vec![ServiceGroup {
                service_name: service_name.to_string(),
                hosts: hosts
                    .iter()
                    .map(|(hostname, port)| HostPort {
                        hostname: hostname.to_string(),
                        port: port.to_string(),
                    })
                    .collect(),
            }],
        }
    }
}

impl PeerView for RelationSnapshot {
    fn list_services(&self) -> Vec<ServiceGroup> {
        self.services.clone()
    }
}
