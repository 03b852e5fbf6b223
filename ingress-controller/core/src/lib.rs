//! Ingress DAG
//!
//! The builder compiles the cluster's ingress resources into a directed acyclic graph of proxy
//! configuration vertices:
//!
//! ```text
//! [ Listener ] -> [ VirtualHost ] -> [ PrefixRoute | RegexRoute ] -> [ Cluster ] -> [ HttpService ]
//! [ Listener ] -> [ SecureVirtualHost ] -> [ Secret ]
//!                                      \-> [ TcpProxy ] -> [ TcpService ]
//! ```
//!
//! The graph is not a tree: a `Cluster` may be referenced by many routes and a `Secret` by many
//! secure virtual hosts. Consumers enumerate the graph with [`walk`], which enters every vertex at
//! most once, keyed by [`VertexId`] rather than by value.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod dag;
pub mod http;
mod listener;
mod secret;
pub mod status;
pub mod tcp;
mod vertex;
mod walk;

pub use self::{
    dag::Dag,
    http::{
        Cluster, HttpService, PrefixRoute, RegexRoute, RequestTimeout, Route, RouteMatch,
        SecureVirtualHost, TlsVersion, VirtualHost,
    },
    listener::Listener,
    secret::Secret,
    status::{ObjectRef, ObjectStatus, Status},
    tcp::{TcpProxy, TcpService},
    vertex::{Vertex, VertexId},
    walk::{walk, Visitor},
};
