use crate::{Secret, TcpProxy, Vertex};
use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr, sync::Arc, time::Duration};

/// A plain HTTP virtual host.
#[derive(Clone, Debug, Default)]
pub struct VirtualHost {
    /// The host name, or `*` for the default host.
    pub name: String,

    /// Routes ordered by match precedence.
    pub routes: BTreeMap<RouteMatch, Vertex>,
}

/// A virtual host that terminates (or passes through) TLS.
#[derive(Clone, Debug)]
pub struct SecureVirtualHost {
    pub virtual_host: VirtualHost,
    pub min_tls_version: TlsVersion,

    /// Unset when TLS is passed through to a TCP proxy.
    pub secret: Option<Arc<Secret>>,

    pub tcp_proxy: Option<Arc<TcpProxy>>,
}

/// Orders routes within a virtual host.
///
/// Regular expressions take precedence over prefixes. Within each kind, longer expressions take
/// precedence over shorter ones, and ties are broken lexicographically.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RouteMatch {
    Regex(String),
    Prefix(String),
}

#[derive(Clone, Debug)]
pub struct PrefixRoute {
    pub prefix: String,
    pub route: Route,
}

#[derive(Clone, Debug)]
pub struct RegexRoute {
    pub regex: String,
    pub route: Route,
}

/// Properties shared by all route kinds.
#[derive(Clone, Debug, Default)]
pub struct Route {
    pub clusters: Vec<Arc<Cluster>>,

    /// Redirect plain HTTP requests to HTTPS.
    pub https_upgrade: bool,

    pub websocket: bool,
    pub prefix_rewrite: Option<String>,
    pub timeout: Option<RequestTimeout>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestTimeout {
    Infinite,
    After(Duration),
}

/// A weighted upstream target.
#[derive(Clone, Debug)]
pub struct Cluster {
    pub upstream: Arc<HttpService>,
    pub weight: u32,
    pub load_balancer_strategy: Option<String>,
}

/// A kubernetes `Service` port serving HTTP.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HttpService {
    pub namespace: String,
    pub name: String,
    pub port: u16,
    pub port_name: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    #[default]
    V1_1,
    V1_2,
    V1_3,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid TLS version: {0:?}")]
pub struct InvalidTlsVersion(String);

// === impl VirtualHost ===

impl VirtualHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: BTreeMap::new(),
        }
    }

    /// Adds a route, replacing any route with the same match.
    pub fn add_route(&mut self, route: Vertex) {
        let key = match &route {
            Vertex::PrefixRoute(r) => RouteMatch::Prefix(r.prefix.clone()),
            Vertex::RegexRoute(r) => RouteMatch::Regex(r.regex.clone()),
            _ => {
                debug_assert!(false, "not a route: {}", route.kind());
                return;
            }
        };
        self.routes.insert(key, route);
    }

    pub(crate) fn visit_routes(&self, f: &mut dyn FnMut(&Vertex)) {
        for route in self.routes.values() {
            f(route);
        }
    }
}

// === impl RouteMatch ===

impl RouteMatch {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Regex(s) | Self::Prefix(s) => s,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Regex(_) => 0,
            Self::Prefix(_) => 1,
        }
    }
}

impl Ord for RouteMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| other.as_str().len().cmp(&self.as_str().len()))
            .then_with(|| self.as_str().cmp(other.as_str()))
    }
}

impl PartialOrd for RouteMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// === impl Route ===

impl Route {
    pub(crate) fn visit_clusters(&self, f: &mut dyn FnMut(&Vertex)) {
        for cluster in &self.clusters {
            f(&Vertex::Cluster(cluster.clone()));
        }
    }
}

// === impl Cluster ===

impl Cluster {
    /// A name that is unique for each distinct upstream configuration.
    pub fn name(&self) -> String {
        let HttpService {
            namespace,
            name,
            port,
            ..
        } = &*self.upstream;
        match &self.load_balancer_strategy {
            Some(strategy) => format!("{namespace}/{name}/{port}/{strategy}"),
            None => format!("{namespace}/{name}/{port}"),
        }
    }
}

// === impl TlsVersion ===

impl FromStr for TlsVersion {
    type Err = InvalidTlsVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.1" => Ok(Self::V1_1),
            "1.2" => Ok(Self::V1_2),
            "1.3" => Ok(Self::V1_3),
            s => Err(InvalidTlsVersion(s.to_string())),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1_1 => "1.1".fmt(f),
            Self::V1_2 => "1.2".fmt(f),
            Self::V1_3 => "1.3".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(p: &str) -> RouteMatch {
        RouteMatch::Prefix(p.to_string())
    }

    fn regex(r: &str) -> RouteMatch {
        RouteMatch::Regex(r.to_string())
    }

    #[test]
    fn route_precedence() {
        let mut matches = vec![
            prefix("/"),
            prefix("/api"),
            regex("/a.*"),
            prefix("/api/v1"),
            regex("/static/.+"),
            prefix("/app"),
        ];
        matches.sort();
        assert_eq!(
            matches,
            vec![
                regex("/static/.+"),
                regex("/a.*"),
                prefix("/api/v1"),
                prefix("/api"),
                prefix("/app"),
                prefix("/"),
            ]
        );
    }

    #[test]
    fn parse_tls_version() {
        assert_eq!("1.3".parse::<TlsVersion>().unwrap(), TlsVersion::V1_3);
        assert_eq!("1.2".parse::<TlsVersion>().unwrap(), TlsVersion::V1_2);
        assert!("1.0".parse::<TlsVersion>().is_err());
        assert_eq!(TlsVersion::default(), TlsVersion::V1_1);
        assert_eq!(TlsVersion::V1_2.to_string(), "1.2");
    }

    #[test]
    fn cluster_name() {
        let upstream = Arc::new(HttpService {
            namespace: "default".to_string(),
            name: "web".to_string(),
            port: 8080,
            port_name: None,
        });
        let mut cluster = Cluster {
            upstream,
            weight: 0,
            load_balancer_strategy: None,
        };
        assert_eq!(cluster.name(), "default/web/8080");
        cluster.load_balancer_strategy = Some("Random".to_string());
        assert_eq!(cluster.name(), "default/web/8080/Random");
    }
}
