use super::{parse_timeout, PortRef, Source, State};
use crate::Meta;
use ahash::AHashMap as HashMap;
use ingress_controller_core::{
    ObjectRef, ObjectStatus, PrefixRoute, Route, TcpProxy, TlsVersion, Vertex,
};
use ingress_controller_k8s_api::{contour, IngressRoute};
use std::sync::Arc;

/// The kind under which `IngressRoute` statuses are recorded.
pub const KIND: &str = "IngressRoute";

impl<'s, S: Source + ?Sized> State<'s, S> {
    pub(super) fn compute_ingress_routes(&mut self) {
        let source = self.source;
        let ingress_routes = source.ingress_routes();

        let roots = ingress_routes
            .iter()
            .copied()
            .filter(|ir| ir.spec.virtualhost.is_some())
            .collect::<Vec<_>>();

        // Each fqdn may be claimed by only one root.
        let mut fqdns = HashMap::<&str, Vec<Meta>>::default();
        for &root in &roots {
            if let Some(vhost) = root.spec.virtualhost.as_ref() {
                if !vhost.fqdn.is_empty() && self.root_namespace_permitted(root) {
                    fqdns.entry(&vhost.fqdn).or_default().push(Meta::of(root));
                }
            }
        }

        for &root in &roots {
            self.compute_root(root, &fqdns);
        }

        // Anything that has not been given a status was not reached from a root.
        for ir in ingress_routes {
            if ir.spec.virtualhost.is_none() {
                self.set_status(object_ref(&Meta::of(ir)), ObjectStatus::orphaned());
            }
        }
    }

    fn root_namespace_permitted(&self, root: &IngressRoute) -> bool {
        let namespaces = self.source.root_namespaces();
        namespaces.is_empty()
            || root
                .metadata
                .namespace
                .as_deref()
                .is_some_and(|ns| namespaces.iter().any(|n| n == ns))
    }

    fn compute_root(&mut self, root: &'s IngressRoute, fqdns: &HashMap<&str, Vec<Meta>>) {
        let meta = Meta::of(root);
        let Some(vhost) = root.spec.virtualhost.as_ref() else {
            return;
        };

        if !self.root_namespace_permitted(root) {
            self.invalid(
                &meta,
                "root IngressRoute cannot be defined in this namespace",
                None,
            );
            return;
        }

        let host = vhost.fqdn.as_str();
        if host.is_empty() {
            self.invalid(&meta, "Spec.VirtualHost.Fqdn must be specified", None);
            return;
        }

        if let Some(claimants) = fqdns.get(host).filter(|c| c.len() > 1) {
            let claimants = claimants
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            self.invalid(
                &meta,
                format!("fqdn {host:?} is used in multiple IngressRoutes: {claimants}"),
                Some(host),
            );
            return;
        }

        let mut enforce_tls = false;
        if let Some(tls) = vhost.tls.as_ref() {
            if tls.passthrough {
                if root.spec.tcpproxy.is_none() {
                    self.invalid(
                        &meta,
                        "tls.passthrough can only be used with tcpproxy",
                        Some(host),
                    );
                    return;
                }
                self.secure_virtual_host(host);
            } else {
                let secret_meta = Meta::parse_ref(&tls.secret_name, &meta.namespace);
                let secret = if self.delegation_permitted(&secret_meta, &meta.namespace) {
                    self.lookup_secret(&secret_meta)
                } else {
                    None
                };
                let Some(secret) = secret else {
                    self.invalid(
                        &meta,
                        format!("TLS secret {secret_meta} is not found or is not delegated"),
                        Some(host),
                    );
                    return;
                };

                let min_tls_version = tls
                    .minimum_protocol_version
                    .as_deref()
                    .and_then(|v| v.parse::<TlsVersion>().ok())
                    .unwrap_or_default();
                let svhost = self.secure_virtual_host(host);
                svhost.secret = Some(secret);
                svhost.min_tls_version = min_tls_version;
                enforce_tls = true;
            }
        }

        let mut visited = vec![meta.clone()];

        // A TCP proxy serves the whole host; routes are not considered.
        if let Some(tcpproxy) = root.spec.tcpproxy.as_ref() {
            if vhost.tls.is_none() {
                self.invalid(
                    &meta,
                    "tcpproxy requires tls.secretName or tls.passthrough",
                    Some(host),
                );
                return;
            }
            match self.tcp_proxy(&meta, tcpproxy, host, &mut visited) {
                Some(proxy) => {
                    self.secure_virtual_host(host).tcp_proxy = Some(Arc::new(proxy));
                    self.set_status(object_ref(&meta), ObjectStatus::valid(host));
                }
                None => self.invalid(&meta, "tcpproxy is invalid", Some(host)),
            }
            return;
        }

        self.process_routes(&meta, root, None, &mut visited, host, enforce_tls);
    }

    /// Compiles a `tcpproxy`, following delegation. `visited` holds the delegation chain
    /// leading to `meta`, including `meta`.
    fn tcp_proxy(
        &mut self,
        meta: &Meta,
        proxy: &'s contour::TcpProxy,
        host: &str,
        visited: &mut Vec<Meta>,
    ) -> Option<TcpProxy> {
        if let Some(delegate) = proxy.delegate.as_ref() {
            let target = delegate_meta(delegate, &meta.namespace);
            if visited.contains(&target) {
                let chain = delegation_chain(visited, &target);
                self.invalid(
                    meta,
                    format!("tcpproxy creates a delegation cycle: {chain}"),
                    Some(host),
                );
                return None;
            }

            let source = self.source;
            let Some(dest) = source.ingress_route(&target) else {
                self.invalid(
                    meta,
                    format!("tcpproxy: delegate {target} not found"),
                    Some(host),
                );
                return None;
            };
            if dest.spec.virtualhost.is_some() {
                self.invalid(
                    meta,
                    format!("tcpproxy: delegate {target} is a root IngressRoute"),
                    Some(host),
                );
                return None;
            }
            let Some(dest_proxy) = dest.spec.tcpproxy.as_ref() else {
                self.invalid(
                    meta,
                    format!("tcpproxy: delegate {target} does not define a tcpproxy"),
                    Some(host),
                );
                return None;
            };

            visited.push(target.clone());
            let proxy = self.tcp_proxy(&target, dest_proxy, host, visited);
            visited.pop();
            if proxy.is_some() {
                self.set_status(object_ref(&target), ObjectStatus::valid(host));
            }
            return proxy;
        }

        let mut services = Vec::with_capacity(proxy.services.len());
        for svc in &proxy.services {
            let service = Meta::new(meta.namespace.clone(), svc.name.clone());
            let Some(tcp) = self.lookup_tcp_service(&service, svc.port) else {
                self.invalid(
                    meta,
                    format!("tcpproxy: service {service}/{} not found", svc.port),
                    Some(host),
                );
                return None;
            };
            services.push(tcp);
        }
        if services.is_empty() {
            self.invalid(meta, "tcpproxy: no services", Some(host));
            return None;
        }
        Some(TcpProxy { services })
    }

    /// Adds an `IngressRoute`'s routes to `host`, following delegation. Every route must match
    /// within `prefix`, the match of the route that delegated to this object.
    fn process_routes(
        &mut self,
        meta: &Meta,
        ir: &'s IngressRoute,
        prefix: Option<&str>,
        visited: &mut Vec<Meta>,
        host: &str,
        enforce_tls: bool,
    ) {
        let source = self.source;

        // An object with any malformed route contributes no routes at all.
        if let Some(error) = validate_routes(&ir.spec.routes, prefix) {
            self.invalid(meta, error, Some(host));
            return;
        }

        for route in &ir.spec.routes {
            if let Some(delegate) = route.delegate.as_ref() {
                let target = delegate_meta(delegate, &meta.namespace);
                if visited.contains(&target) {
                    let chain = delegation_chain(visited, &target);
                    self.invalid(
                        meta,
                        format!("route creates a delegation cycle: {chain}"),
                        Some(host),
                    );
                    continue;
                }

                let Some(dest) = source.ingress_route(&target) else {
                    self.invalid(meta, format!("delegate {target} not found"), Some(host));
                    continue;
                };
                if dest.spec.virtualhost.is_some() {
                    self.invalid(
                        meta,
                        format!("delegate {target} is a root IngressRoute"),
                        Some(host),
                    );
                    continue;
                }

                visited.push(target.clone());
                let prefix = Some(route.match_.as_str());
                self.process_routes(&target, dest, prefix, visited, host, enforce_tls);
                visited.pop();
                continue;
            }

            let mut clusters = Vec::with_capacity(route.services.len());
            for svc in &route.services {
                let service = Meta::new(meta.namespace.clone(), svc.name.clone());
                let Some(upstream) =
                    self.lookup_http_service(&service, PortRef::Number(svc.port.into()))
                else {
                    continue;
                };
                let weight = svc.weight.unwrap_or(0);
                clusters.push(self.cluster(upstream, weight, svc.strategy.clone()));
            }
            if clusters.is_empty() {
                tracing::debug!(
                    ingressroute = %meta,
                    route = %route.match_,
                    "route has no resolvable services",
                );
                continue;
            }

            let permit_insecure = route.permit_insecure && !self.config.disable_permit_insecure;
            let compiled = Route {
                clusters,
                https_upgrade: false,
                websocket: route.enable_websockets,
                prefix_rewrite: route.prefix_rewrite.clone(),
                timeout: parse_timeout(
                    route
                        .timeout_policy
                        .as_ref()
                        .and_then(|policy| policy.request.as_deref()),
                ),
            };

            let insecure = Route {
                https_upgrade: enforce_tls && !permit_insecure,
                ..compiled.clone()
            };
            self.virtual_host(host).add_route(prefix_route(&route.match_, insecure));
            if enforce_tls {
                self.secure_virtual_host(host)
                    .virtual_host
                    .add_route(prefix_route(&route.match_, compiled));
            }
        }

        self.set_status(object_ref(meta), ObjectStatus::valid(host));
    }

    fn invalid(&mut self, meta: &Meta, description: impl Into<String>, host: Option<&str>) {
        tracing::debug!(ingressroute = %meta, "invalid");
        self.set_status(
            object_ref(meta),
            ObjectStatus::invalid(description, host.map(str::to_string)),
        );
    }
}

/// Checks that every route matches within the delegating prefix and names only valid ports.
fn validate_routes(routes: &[contour::Route], prefix: Option<&str>) -> Option<String> {
    for route in routes {
        if let Some(prefix) = prefix {
            if !route.match_.starts_with(prefix) {
                return Some(format!(
                    "the path prefix {:?} does not match the parent's path prefix {prefix:?}",
                    route.match_
                ));
            }
        }
        if let Some(svc) = route.services.iter().find(|svc| svc.port == 0) {
            return Some(format!(
                "route {:?}: service {}: port must be in the range 1-65535",
                route.match_, svc.name
            ));
        }
    }
    None
}

fn object_ref(meta: &Meta) -> ObjectRef {
    ObjectRef::new(KIND, meta.namespace.clone(), meta.name.clone())
}

fn delegate_meta(delegate: &contour::Delegate, namespace: &str) -> Meta {
    let namespace = delegate
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(namespace);
    Meta::new(namespace, delegate.name.clone())
}

fn delegation_chain(visited: &[Meta], target: &Meta) -> String {
    visited
        .iter()
        .chain(Some(target))
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn prefix_route(prefix: &str, route: Route) -> Vertex {
    Vertex::PrefixRoute(Arc::new(PrefixRoute {
        prefix: prefix.to_string(),
        route,
    }))
}
