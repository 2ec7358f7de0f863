//! Tenant identity allocation and lookup
//!
//! An identity is an 8-character lowercase alphanumeric token naming one
//! backend's routing namespace. Uniqueness is checked against the document
//! at allocation time, not reserved globally; the registration lock makes
//! the check-then-append cycle safe against concurrent requests.

use crate::caddyfile::ConfigDocument;
use crate::error::RegistryError;
use rand::Rng;

const ID_LEN: usize = 8;
const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Attempts before giving up. Collisions in a 36^8 keyspace are negligible
/// at any realistic scale, so hitting the bound signals an operational
/// anomaly rather than bad luck.
const MAX_ATTEMPTS: usize = 5;

/// Find the tenant identity already registered for `backend_host`, if any.
///
/// Scans site blocks in file order and returns the tenant label of the
/// first block whose proxy target points at the backend. When several
/// blocks for different services reference the same backend, whichever
/// comes first wins; the system assumes one backend maps to one tenant.
pub fn find_existing_by_backend(
    doc: &ConfigDocument,
    backend_host: &str,
    base_domain: &str,
) -> Option<String> {
    doc.sites.iter().find_map(|site| {
        if site.target_backend_host() != Some(backend_host) {
            return None;
        }
        site.tenant_label(base_domain).map(str::to_string)
    })
}

/// Allocate a fresh identity that collides with no tenant label currently
/// in the document.
pub fn allocate(doc: &ConfigDocument, base_domain: &str) -> Result<String, RegistryError> {
    allocate_with(doc, base_domain, random_candidate)
}

/// Allocation with a pluggable candidate generator, so exhaustion is
/// testable without depending on the RNG.
pub fn allocate_with(
    doc: &ConfigDocument,
    base_domain: &str,
    mut candidate: impl FnMut() -> String,
) -> Result<String, RegistryError> {
    let taken = doc.tenant_labels(base_domain);
    for _ in 0..MAX_ATTEMPTS {
        let id = candidate();
        if !taken.contains(id.as_str()) {
            return Ok(id);
        }
    }
    Err(RegistryError::IdentityExhausted)
}

fn random_candidate() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}
