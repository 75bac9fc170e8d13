use std::collections::HashMap;
use std::sync::Arc;

use crate::endpoint::CapabilityEndpoint;

/// A capability bound to the gateway route it serves.
#[derive(Clone, Debug)]
pub struct RegisteredCapability {
    pub route: String,
    pub endpoint: Arc<CapabilityEndpoint>,
}

/// Route and name indexes over the configured capability endpoints.
/// Built once at startup; lookups are read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct CapabilityRegistry {
    entries: Vec<RegisteredCapability>,
    by_route: HashMap<String, Arc<CapabilityEndpoint>>,
    by_name: HashMap<String, Arc<CapabilityEndpoint>>,
}

impl CapabilityRegistry {
    pub fn new(entries: Vec<RegisteredCapability>) -> Self {
        let by_route = entries
            .iter()
            .map(|entry| (entry.route.clone(), entry.endpoint.clone()))
            .collect();
        let by_name = entries
            .iter()
            .map(|entry| (entry.endpoint.name.clone(), entry.endpoint.clone()))
            .collect();
        Self {
            entries,
            by_route,
            by_name,
        }
    }

    pub fn lookup_route(&self, path: &str) -> Option<&Arc<CapabilityEndpoint>> {
        self.by_route.get(path)
    }

    pub fn endpoint(&self, name: &str) -> Option<&Arc<CapabilityEndpoint>> {
        self.by_name.get(name)
    }

    pub fn entries(&self) -> &[RegisteredCapability] {
        &self.entries
    }
}
