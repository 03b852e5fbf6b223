//! Compiles a snapshot of the cache into a [`Dag`].
//!
//! Building never fails. Objects that cannot be compiled, because they reference missing secrets
//! or services or because their delegation chain cannot be resolved, are left out of the graph,
//! and the affected `IngressRoute`s are reported in [`Dag::statuses`].
//!
//! Vertices are interned for the duration of a build: every reference to the same service port
//! yields the same `HttpService`, every reference to the same weighted service yields the same
//! `Cluster`, and every reference to the same secret yields the same `Secret`.

use crate::{Cache, Meta, SharedCache};
use ahash::AHashMap as HashMap;
use ingress_controller_core::{
    Cluster, Dag, HttpService, Listener, ObjectRef, ObjectStatus, PrefixRoute, RegexRoute,
    RequestTimeout, Route, SecureVirtualHost, TcpService, Vertex, VirtualHost,
};
use ingress_controller_k8s_api::{
    self as k8s, duration::parse_duration, Ingress, IngressRoute, Secret, Service,
    TLSCertificateDelegation,
};
use std::{collections::BTreeMap, sync::Arc};

mod ingress;
mod ingress_route;

pub use self::ingress_route::KIND as INGRESS_ROUTE_KIND;

#[cfg(test)]
mod tests;

/// Read access to the objects a build compiles.
pub trait Source {
    /// All `Ingress`es, ordered by identity.
    fn ingresses(&self) -> Vec<&Ingress>;

    /// All `IngressRoute`s, ordered by identity.
    fn ingress_routes(&self) -> Vec<&IngressRoute>;

    fn ingress_route(&self, meta: &Meta) -> Option<&IngressRoute>;

    fn secret(&self, meta: &Meta) -> Option<&Secret>;

    fn service(&self, meta: &Meta) -> Option<&Service>;

    /// The `TLSCertificateDelegation`s in a namespace.
    fn delegations(&self, namespace: &str) -> Vec<&TLSCertificateDelegation>;

    /// Namespaces in which root `IngressRoute`s may be defined. Empty permits all namespaces.
    fn root_namespaces(&self) -> &[String];
}

#[derive(Clone, Debug)]
pub struct BuildConfig {
    /// Ignores `permitInsecure` on `IngressRoute` routes, so that routes on TLS virtual hosts are
    /// always upgraded to HTTPS.
    pub disable_permit_insecure: bool,

    pub http_listener: ListenerConfig,
    pub https_listener: ListenerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    pub address: String,
    pub port: u16,
}

/// Compiles a [`Source`] into a [`Dag`].
#[derive(Debug)]
pub struct Builder<'s, S: ?Sized> {
    source: &'s S,
    config: &'s BuildConfig,
}

/// Builds a `Dag` from a consistent snapshot of the cache.
///
/// The read lock is held for the entire build, so no update is observed part-way through.
pub fn build(cache: &SharedCache, config: &BuildConfig) -> Dag {
    let cache = cache.read();
    Builder::new(&*cache, config).build()
}

/// The mutable state of a single build.
struct State<'s, S: ?Sized> {
    source: &'s S,
    config: &'s BuildConfig,

    secrets: HashMap<Meta, Option<Arc<ingress_controller_core::Secret>>>,
    services: HashMap<(Meta, u16), Arc<HttpService>>,
    tcp_services: HashMap<(Meta, u16), Arc<TcpService>>,
    clusters: HashMap<ClusterKey, Arc<Cluster>>,

    virtual_hosts: BTreeMap<String, VirtualHost>,
    secure_virtual_hosts: BTreeMap<String, SecureVirtualHost>,

    statuses: BTreeMap<ObjectRef, ObjectStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClusterKey {
    service: Meta,
    port: u16,
    weight: u32,
    strategy: Option<String>,
}

/// References a port of a `Service`.
#[derive(Copy, Clone, Debug)]
enum PortRef<'a> {
    Number(i32),
    Name(&'a str),
}

// === impl BuildConfig ===

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            disable_permit_insecure: false,
            http_listener: ListenerConfig {
                address: "0.0.0.0".to_string(),
                port: 8080,
            },
            https_listener: ListenerConfig {
                address: "0.0.0.0".to_string(),
                port: 8443,
            },
        }
    }
}

// === impl Builder ===

impl<'s, S: Source + ?Sized> Builder<'s, S> {
    pub fn new(source: &'s S, config: &'s BuildConfig) -> Self {
        Self { source, config }
    }

    pub fn build(&self) -> Dag {
        let mut state = State {
            source: self.source,
            config: self.config,
            secrets: HashMap::default(),
            services: HashMap::default(),
            tcp_services: HashMap::default(),
            clusters: HashMap::default(),
            virtual_hosts: BTreeMap::new(),
            secure_virtual_hosts: BTreeMap::new(),
            statuses: BTreeMap::new(),
        };
        state.compute_ingresses();
        state.compute_ingress_routes();
        state.into_dag()
    }
}

// === impl State ===

impl<'s, S: Source + ?Sized> State<'s, S> {
    /// Looks up a secret, returning it only if it holds a certificate and key.
    fn lookup_secret(&mut self, meta: &Meta) -> Option<Arc<ingress_controller_core::Secret>> {
        if let Some(secret) = self.secrets.get(meta) {
            return secret.clone();
        }

        let secret = self.source.secret(meta).and_then(|secret| {
            let data = secret.data.as_ref()?;
            let cert = data.get(k8s::TLS_CERT_KEY).filter(|v| !v.0.is_empty())?;
            let key = data.get(k8s::TLS_PRIVATE_KEY_KEY).filter(|v| !v.0.is_empty())?;
            Some(Arc::new(ingress_controller_core::Secret {
                namespace: meta.namespace.clone(),
                name: meta.name.clone(),
                cert: cert.0.clone(),
                key: key.0.clone(),
            }))
        });
        if secret.is_none() {
            tracing::debug!(%meta, "secret is missing or does not hold a TLS certificate");
        }
        self.secrets.insert(meta.clone(), secret.clone());
        secret
    }

    /// Returns true if objects in `namespace` may use `secret`.
    ///
    /// Secrets in the object's own namespace are always permitted. Otherwise the secret's
    /// namespace must hold a `TLSCertificateDelegation` for the secret that targets `namespace`.
    fn delegation_permitted(&self, secret: &Meta, namespace: &str) -> bool {
        if secret.namespace == namespace {
            return true;
        }
        self.source
            .delegations(&secret.namespace)
            .into_iter()
            .flat_map(|d| d.spec.delegations.iter())
            .any(|d| d.secret_name == secret.name && d.permits(namespace))
    }

    fn lookup_http_service(&mut self, meta: &Meta, port: PortRef<'_>) -> Option<Arc<HttpService>> {
        let svc_port = self.service_port(meta, port)?;
        let number = u16::try_from(svc_port.port).ok().filter(|p| *p != 0)?;
        let svc = self
            .services
            .entry((meta.clone(), number))
            .or_insert_with(|| {
                Arc::new(HttpService {
                    namespace: meta.namespace.clone(),
                    name: meta.name.clone(),
                    port: number,
                    port_name: svc_port.name.clone(),
                })
            });
        Some(svc.clone())
    }

    fn lookup_tcp_service(&mut self, meta: &Meta, port: u16) -> Option<Arc<TcpService>> {
        self.service_port(meta, PortRef::Number(port.into()))?;
        let svc = self
            .tcp_services
            .entry((meta.clone(), port))
            .or_insert_with(|| {
                Arc::new(TcpService {
                    namespace: meta.namespace.clone(),
                    name: meta.name.clone(),
                    port,
                })
            });
        Some(svc.clone())
    }

    fn service_port(&self, meta: &Meta, port: PortRef<'_>) -> Option<&'s k8s::ServicePort> {
        let source: &'s S = self.source;
        let svc = source.service(meta);
        let found = svc
            .and_then(|svc| svc.spec.as_ref())
            .and_then(|spec| spec.ports.as_ref())
            .and_then(|ports| {
                ports.iter().find(|p| match port {
                    PortRef::Number(n) => p.port == n,
                    PortRef::Name(name) => p.name.as_deref() == Some(name),
                })
            });
        if found.is_none() {
            tracing::debug!(service = %meta, ?port, "service port not found");
        }
        found
    }

    fn cluster(
        &mut self,
        upstream: Arc<HttpService>,
        weight: u32,
        strategy: Option<String>,
    ) -> Arc<Cluster> {
        let key = ClusterKey {
            service: Meta::new(upstream.namespace.clone(), upstream.name.clone()),
            port: upstream.port,
            weight,
            strategy: strategy.clone(),
        };
        self.clusters
            .entry(key)
            .or_insert_with(|| {
                Arc::new(Cluster {
                    upstream,
                    weight,
                    load_balancer_strategy: strategy,
                })
            })
            .clone()
    }

    fn virtual_host(&mut self, host: &str) -> &mut VirtualHost {
        self.virtual_hosts
            .entry(host.to_string())
            .or_insert_with(|| VirtualHost::new(host))
    }

    fn secure_virtual_host(&mut self, host: &str) -> &mut SecureVirtualHost {
        self.secure_virtual_hosts
            .entry(host.to_string())
            .or_insert_with(|| SecureVirtualHost {
                virtual_host: VirtualHost::new(host),
                min_tls_version: Default::default(),
                secret: None,
                tcp_proxy: None,
            })
    }

    /// Records an object's status. The first status recorded for an object is kept.
    fn set_status(&mut self, obj: ObjectRef, status: ObjectStatus) {
        self.statuses.entry(obj).or_insert(status);
    }

    fn into_dag(self) -> Dag {
        let mut roots = Vec::new();

        let virtual_hosts = self
            .virtual_hosts
            .into_iter()
            .filter(|(_, vhost)| !vhost.routes.is_empty())
            .map(|(host, vhost)| (host, Vertex::VirtualHost(Arc::new(vhost))))
            .collect::<BTreeMap<_, _>>();
        if !virtual_hosts.is_empty() {
            let ListenerConfig { address, port } = self.config.http_listener.clone();
            roots.push(Vertex::Listener(Arc::new(Listener {
                address,
                port,
                virtual_hosts,
            })));
        }

        // A secure virtual host is served only if it terminates TLS for some routes or passes
        // connections through to a TCP proxy.
        let secure_virtual_hosts = self
            .secure_virtual_hosts
            .into_iter()
            .filter(|(_, svhost)| {
                svhost.tcp_proxy.is_some()
                    || (svhost.secret.is_some() && !svhost.virtual_host.routes.is_empty())
            })
            .map(|(host, svhost)| (host, Vertex::SecureVirtualHost(Arc::new(svhost))))
            .collect::<BTreeMap<_, _>>();
        if !secure_virtual_hosts.is_empty() {
            let ListenerConfig { address, port } = self.config.https_listener.clone();
            roots.push(Vertex::Listener(Arc::new(Listener {
                address,
                port,
                virtual_hosts: secure_virtual_hosts,
            })));
        }

        Dag::new(roots, self.statuses)
    }
}

/// Builds a route vertex, matching by regular expression if the path contains any regex
/// metacharacters, or by prefix otherwise.
fn route_vertex(path: &str, route: Route) -> Vertex {
    if path.contains(['^', '+', '*', '[', ']', '%']) {
        Vertex::RegexRoute(Arc::new(RegexRoute {
            regex: path.to_string(),
            route,
        }))
    } else {
        Vertex::PrefixRoute(Arc::new(PrefixRoute {
            prefix: path.to_string(),
            route,
        }))
    }
}

/// Parses a request timeout. A malformed timeout is treated as no timeout at all.
fn parse_timeout(timeout: Option<&str>) -> Option<RequestTimeout> {
    match timeout? {
        "" => None,
        "infinity" => Some(RequestTimeout::Infinite),
        timeout => match parse_duration(timeout) {
            Ok(d) => Some(RequestTimeout::After(d)),
            Err(error) => {
                tracing::debug!(%error, timeout, "invalid request timeout");
                Some(RequestTimeout::Infinite)
            }
        },
    }
}

// === impl Cache ===

impl Source for Cache {
    fn ingresses(&self) -> Vec<&Ingress> {
        sorted(self.ingresses())
    }

    fn ingress_routes(&self) -> Vec<&IngressRoute> {
        sorted(self.ingress_routes())
    }

    fn ingress_route(&self, meta: &Meta) -> Option<&IngressRoute> {
        self.ingress_routes()?.get(meta)
    }

    fn secret(&self, meta: &Meta) -> Option<&Secret> {
        self.secrets()?.get(meta)
    }

    fn service(&self, meta: &Meta) -> Option<&Service> {
        self.services()?.get(meta)
    }

    fn delegations(&self, namespace: &str) -> Vec<&TLSCertificateDelegation> {
        let mut delegations = self
            .delegations()
            .into_iter()
            .flat_map(|objs| objs.iter())
            .filter(|(meta, _)| meta.namespace == namespace)
            .collect::<Vec<_>>();
        delegations.sort_by(|(a, _), (b, _)| a.cmp(b));
        delegations.into_iter().map(|(_, d)| d).collect()
    }

    fn root_namespaces(&self) -> &[String] {
        Cache::root_namespaces(self)
    }
}

fn sorted<T>(objs: Option<&HashMap<Meta, T>>) -> Vec<&T> {
    let mut objs = objs
        .into_iter()
        .flat_map(|objs| objs.iter())
        .collect::<Vec<_>>();
    objs.sort_by(|(a, _), (b, _)| a.cmp(b));
    objs.into_iter().map(|(_, obj)| obj).collect()
}
