//! Service catalog: which services are routable and how
//!
//! The catalog is built from configuration at startup and never mutated at
//! runtime. Each entry maps a short service tag to its default port and the
//! block template its proxy engine needs.

use serde::Deserialize;
use std::collections::HashMap;

/// Block template a service's site block is synthesized from
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// Single host-scoped reverse_proxy directive
    #[default]
    Plain,
    /// reverse_proxy scoped to an explicit match-all path
    PathScoped,
    /// Path-scoped proxy plus a connection-upgrade matcher routing
    /// WebSocket handshakes to the same target
    #[serde(rename = "websocket")]
    WebsocketUpgrading,
}

/// Catalog entry for one routable service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSpec {
    /// Default port on the registering backend
    pub port: Option<u16>,
    /// Block template kind
    #[serde(default)]
    pub kind: ServiceKind,
    /// Static default target used when the caller supplies neither an
    /// override nor a backend host
    pub target: Option<String>,
}

/// Immutable name -> spec mapping
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: HashMap<String, ServiceSpec>,
}

impl ServiceCatalog {
    pub fn new(services: HashMap<String, ServiceSpec>) -> Self {
        Self { services }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    /// Template kind for a service; names absent from the catalog default
    /// to the plain template.
    pub fn kind(&self, name: &str) -> ServiceKind {
        self.get(name).map(|s| s.kind).unwrap_or_default()
    }

    /// Resolve the proxy target for one requested service.
    ///
    /// Precedence: explicit caller override, then backend host plus the
    /// catalog port, then the catalog's static default. `None` means the
    /// service has no resolvable target and is skipped.
    pub fn resolve_target(
        &self,
        name: &str,
        override_target: Option<&str>,
        backend_host: Option<&str>,
    ) -> Option<String> {
        if let Some(target) = override_target.filter(|t| !t.is_empty()) {
            return Some(target.to_string());
        }
        let spec = self.get(name);
        if let (Some(host), Some(port)) = (backend_host, spec.and_then(|s| s.port)) {
            return Some(format!("{}:{}", host, port));
        }
        spec.and_then(|s| s.target.clone())
    }
}
