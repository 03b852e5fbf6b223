use std::sync::Arc;

/// Proxies TLS connections for a secure virtual host to a set of TCP services.
#[derive(Clone, Debug, Default)]
pub struct TcpProxy {
    pub services: Vec<Arc<TcpService>>,
}

/// A kubernetes `Service` port receiving proxied TCP connections.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TcpService {
    pub namespace: String,
    pub name: String,
    pub port: u16,
}
