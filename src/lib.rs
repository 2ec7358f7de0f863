//! Tenantgate - self-registration onto a reverse proxy's routing table
//!
//! Remote machines POST a registration and gain per-tenant subdomains
//! pointing at their services. This library:
//! - Allocates a collision-free tenant identifier per backend, reusing the
//!   existing one when a known backend re-registers
//! - Synthesizes correctly-shaped Caddy site blocks per service type
//!   (plain, path-scoped, WebSocket-upgrading)
//! - Mutates the shared Caddyfile atomically, one traceability header per
//!   registration batch
//! - Triggers the external proxy reload after each successful mutation

pub mod api;
pub mod blocks;
pub mod caddyfile;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod registry;
pub mod reload;
pub mod store;
