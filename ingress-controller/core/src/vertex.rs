use crate::{
    Cluster, HttpService, Listener, PrefixRoute, RegexRoute, Secret, SecureVirtualHost, TcpProxy,
    TcpService, VirtualHost,
};
use std::{fmt, sync::Arc};

/// A node in the proxy configuration graph.
///
/// Vertices are immutable once built and are cheap to clone: each variant holds a shared
/// reference, so a clone refers to the same vertex (and has the same [`VertexId`]).
#[derive(Clone, Debug)]
pub enum Vertex {
    Listener(Arc<Listener>),
    Secret(Arc<Secret>),
    HttpService(Arc<HttpService>),
    VirtualHost(Arc<VirtualHost>),
    SecureVirtualHost(Arc<SecureVirtualHost>),
    PrefixRoute(Arc<PrefixRoute>),
    RegexRoute(Arc<RegexRoute>),
    TcpService(Arc<TcpService>),
    TcpProxy(Arc<TcpProxy>),
    Cluster(Arc<Cluster>),
}

/// Identifies a vertex by its allocation.
///
/// Two structurally equal vertices built separately have distinct ids. Ids are only meaningful
/// while the graph that holds the vertices is alive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(usize);

// === impl Vertex ===

impl Vertex {
    /// Invokes `f` once for each direct child of this vertex.
    ///
    /// The order is fixed per vertex kind:
    ///
    /// - a `Listener` yields its virtual hosts ordered by host name;
    /// - a `VirtualHost` yields its routes in match precedence order;
    /// - a `SecureVirtualHost` yields its routes, then its secret, then its TCP proxy;
    /// - a route yields its clusters in declaration order;
    /// - a `Cluster` yields its upstream service;
    /// - a `TcpProxy` yields its TCP services in declaration order.
    ///
    /// Secrets and services have no children.
    pub fn visit(&self, mut f: impl FnMut(&Vertex)) {
        match self {
            Self::Listener(listener) => {
                for vhost in listener.virtual_hosts.values() {
                    f(vhost);
                }
            }
            Self::VirtualHost(vhost) => vhost.visit_routes(&mut f),
            Self::SecureVirtualHost(svhost) => {
                svhost.virtual_host.visit_routes(&mut f);
                if let Some(secret) = &svhost.secret {
                    f(&Self::Secret(secret.clone()));
                }
                if let Some(proxy) = &svhost.tcp_proxy {
                    f(&Self::TcpProxy(proxy.clone()));
                }
            }
            Self::PrefixRoute(route) => route.route.visit_clusters(&mut f),
            Self::RegexRoute(route) => route.route.visit_clusters(&mut f),
            Self::Cluster(cluster) => f(&Self::HttpService(cluster.upstream.clone())),
            Self::TcpProxy(proxy) => {
                for svc in &proxy.services {
                    f(&Self::TcpService(svc.clone()));
                }
            }
            Self::Secret(_) | Self::HttpService(_) | Self::TcpService(_) => {}
        }
    }

    pub fn id(&self) -> VertexId {
        fn id<T>(v: &Arc<T>) -> VertexId {
            VertexId(Arc::as_ptr(v) as *const () as usize)
        }

        match self {
            Self::Listener(v) => id(v),
            Self::Secret(v) => id(v),
            Self::HttpService(v) => id(v),
            Self::VirtualHost(v) => id(v),
            Self::SecureVirtualHost(v) => id(v),
            Self::PrefixRoute(v) => id(v),
            Self::RegexRoute(v) => id(v),
            Self::TcpService(v) => id(v),
            Self::TcpProxy(v) => id(v),
            Self::Cluster(v) => id(v),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Listener(_) => "listener",
            Self::Secret(_) => "secret",
            Self::HttpService(_) => "httpservice",
            Self::VirtualHost(_) => "virtualhost",
            Self::SecureVirtualHost(_) => "securevirtualhost",
            Self::PrefixRoute(_) => "prefixroute",
            Self::RegexRoute(_) => "regexroute",
            Self::TcpService(_) => "tcpservice",
            Self::TcpProxy(_) => "tcpproxy",
            Self::Cluster(_) => "cluster",
        }
    }
}

// === impl VertexId ===

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
