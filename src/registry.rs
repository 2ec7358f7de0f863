//! Registration orchestration
//!
//! One registration is a single pass: resolve the tenant identity, expand
//! the requested services, synthesize blocks for whatever is not already in
//! the file, append the batch under one traceability header, and kick the
//! proxy reload. The whole read-check-append cycle runs under one mutex so
//! concurrent registrations cannot double-allocate an identity or clobber
//! each other's whole-file rewrites.

use crate::blocks::synthesize;
use crate::caddyfile::BlockHeader;
use crate::catalog::ServiceCatalog;
use crate::error::RegistryError;
use crate::identity;
use crate::reload::ReloadTrigger;
use crate::store::ConfigStore;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One requested service: a catalog name plus an optional explicit target
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub name: String,
    pub target: Option<String>,
}

impl ServiceRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }
}

/// Decoded registration request, transport details already resolved
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    /// Opaque client-supplied machine identifier
    pub machine_id: Option<String>,
    /// Backend host the services run on (first non-empty of the wire
    /// fields), absent when the caller supplies only explicit targets
    pub backend_host: Option<String>,
    /// Requested services; empty means the configured default service
    pub services: Vec<ServiceRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// A fresh identity was allocated for this backend
    Created,
    /// The backend was already registered; its identity was reused
    AlreadyExists,
}

/// Successful registration result
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub id: String,
    /// service name -> fully-qualified domain, for every resolved service
    /// whether or not a new block was written
    pub domains: BTreeMap<String, String>,
    pub status: RegistrationStatus,
}

/// Orchestrates registrations over the shared config document
pub struct RegistrationCoordinator {
    store: ConfigStore,
    catalog: ServiceCatalog,
    base_domain: String,
    default_service: String,
    reload: ReloadTrigger,
    /// Serializes the read-check-append cycle across requests
    write_lock: Mutex<()>,
}

impl RegistrationCoordinator {
    pub fn new(
        store: ConfigStore,
        catalog: ServiceCatalog,
        base_domain: impl Into<String>,
        default_service: impl Into<String>,
        reload: ReloadTrigger,
    ) -> Self {
        Self {
            store,
            catalog,
            base_domain: base_domain.into(),
            default_service: default_service.into(),
            reload,
            write_lock: Mutex::new(()),
        }
    }

    /// Handle one registration request end to end.
    ///
    /// Fatal outcomes are allocator exhaustion and config I/O; everything
    /// else degrades into a partial but valid success. Re-registering a
    /// known backend is idempotent: same identity, no duplicate blocks.
    pub async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let doc = self.store.read()?;

        let backend_host = request.backend_host.as_deref();
        let (id, status) = match backend_host
            .and_then(|host| identity::find_existing_by_backend(&doc, host, &self.base_domain))
        {
            Some(existing) => {
                debug!(id = %existing, backend = ?backend_host, "Backend already registered");
                (existing, RegistrationStatus::AlreadyExists)
            }
            None => {
                let fresh = identity::allocate(&doc, &self.base_domain)?;
                debug!(id = %fresh, backend = ?backend_host, "Allocated new tenant identity");
                (fresh, RegistrationStatus::Created)
            }
        };

        let implicit;
        let requested: &[ServiceRequest] = if request.services.is_empty() {
            implicit = [ServiceRequest::named(self.default_service.as_str())];
            &implicit
        } else {
            &request.services
        };

        let mut domains = BTreeMap::new();
        let mut blocks = Vec::new();
        let mut batched_hosts: HashSet<String> = HashSet::new();
        for service in requested {
            let Some(target) =
                self.catalog
                    .resolve_target(&service.name, service.target.as_deref(), backend_host)
            else {
                debug!(service = %service.name, "No resolvable target, skipping service");
                continue;
            };

            let host = format!("{}.{}.{}", service.name, id, self.base_domain);
            domains.insert(service.name.clone(), host.clone());

            if doc.has_site(&host) || !batched_hosts.insert(host.clone()) {
                debug!(%host, "Site block already present, skipping");
                continue;
            }
            blocks.push(synthesize(self.catalog.kind(&service.name), &host, &target));
        }

        if !blocks.is_empty() {
            let header = BlockHeader {
                sequence: doc.next_header_sequence(),
                backend: backend_host.unwrap_or("custom targets").to_string(),
                machine: request
                    .machine_id
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .unwrap_or("unknown")
                    .to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            };
            let written = blocks.len();
            self.store.append(&header, &blocks)?;
            info!(
                id = %id,
                sequence = header.sequence,
                blocks = written,
                status = ?status,
                "Registration committed"
            );
            self.reload.fire();
        } else {
            info!(id = %id, status = ?status, "Registration produced no new blocks");
        }

        Ok(RegistrationOutcome {
            id,
            domains,
            status,
        })
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }
}
