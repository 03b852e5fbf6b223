//! Ingress resource index
//!
//! The [`Cache`] holds the latest known state of each cluster resource that contributes to proxy
//! configuration:
//!
//! - `Ingress` and `IngressRoute` objects define virtual hosts and routes. Each controller only
//!   claims objects annotated with its ingress class (or not annotated at all), so several
//!   controllers may coexist in a cluster.
//! - `Service` objects resolve route backends to ports.
//! - `Secret` objects carry TLS certificates, which may be shared across namespaces by a
//!   `TLSCertificateDelegation`.
//!
//! ```text
//! [ watch events ] -> [ Cache ] -(read lock)-> [ Builder ] -> [ Dag ]
//! ```
//!
//! The cache is shared behind a single reader/writer lock so that a build observes every kind at
//! the same instant; a build holds the read lock for its entire pass.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod builder;
mod cache;
mod meta;
pub mod metrics;

pub use self::{
    builder::{build, BuildConfig, Builder, ListenerConfig, Source},
    cache::{Cache, CacheConfig, Counts, Kind, Resource, SharedCache},
    meta::Meta,
};
