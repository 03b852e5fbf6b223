use super::{parse_timeout, route_vertex, PortRef, Source, State};
use crate::Meta;
use ahash::AHashSet as HashSet;
use ingress_controller_core::{RequestTimeout, Route, TlsVersion};
use ingress_controller_k8s_api::{annotations, Ingress, IngressBackend};

/// Route properties an `Ingress` sets through annotations.
#[derive(Debug)]
struct Options<'i> {
    allow_http: bool,
    force_tls: bool,
    websocket_routes: HashSet<&'i str>,
    timeout: Option<RequestTimeout>,
}

impl<S: Source + ?Sized> State<'_, S> {
    pub(super) fn compute_ingresses(&mut self) {
        let source = self.source;
        let ingresses = source.ingresses();

        // Secure hosts are created before any routes, so that every ingress's routes for a host
        // are served over TLS when any ingress provides a certificate for it.
        for ingress in &ingresses {
            self.compute_ingress_tls(ingress);
        }
        for ingress in &ingresses {
            self.compute_ingress_rules(ingress);
        }
    }

    fn compute_ingress_tls(&mut self, ingress: &Ingress) {
        let meta = Meta::of(ingress);
        let Some(spec) = ingress.spec.as_ref() else {
            return;
        };

        let min_tls_version =
            annotations::annotation(&ingress.metadata, annotations::TLS_MINIMUM_PROTOCOL_VERSION)
                .and_then(|v| v.parse::<TlsVersion>().ok())
                .unwrap_or_default();

        for tls in spec.tls.iter().flatten() {
            let Some(secret_name) = tls.secret_name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            let secret_meta = Meta::parse_ref(secret_name, &meta.namespace);
            if !self.delegation_permitted(&secret_meta, &meta.namespace) {
                tracing::debug!(ingress = %meta, secret = %secret_meta, "secret is not delegated");
                continue;
            }
            let Some(secret) = self.lookup_secret(&secret_meta) else {
                continue;
            };
            for host in tls.hosts.iter().flatten() {
                let svhost = self.secure_virtual_host(host);
                svhost.secret = Some(secret.clone());
                svhost.min_tls_version = min_tls_version;
            }
        }
    }

    fn compute_ingress_rules(&mut self, ingress: &Ingress) {
        let meta = Meta::of(ingress);
        let Some(spec) = ingress.spec.as_ref() else {
            return;
        };

        let metadata = &ingress.metadata;
        let opts = Options {
            allow_http: annotations::annotation(metadata, annotations::ALLOW_HTTP) != Some("false"),
            force_tls: annotations::annotation_is_true(metadata, annotations::FORCE_SSL_REDIRECT),
            websocket_routes: annotations::annotation(metadata, annotations::WEBSOCKET_ROUTES)
                .into_iter()
                .flat_map(|routes| routes.split(','))
                .map(str::trim)
                .filter(|route| !route.is_empty())
                .collect(),
            timeout: parse_timeout(annotations::annotation(metadata, annotations::REQUEST_TIMEOUT)),
        };

        if let Some(backend) = spec.default_backend.as_ref() {
            self.add_ingress_route(&meta, "*", "/", backend, &opts);
        }

        for rule in spec.rules.iter().flatten() {
            let host = rule
                .host
                .as_deref()
                .filter(|h| !h.is_empty())
                .unwrap_or("*");
            for path in rule.http.iter().flat_map(|http| http.paths.iter()) {
                let prefix = path
                    .path
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .unwrap_or("/");
                self.add_ingress_route(&meta, host, prefix, &path.backend, &opts);
            }
        }
    }

    fn add_ingress_route(
        &mut self,
        meta: &Meta,
        host: &str,
        path: &str,
        backend: &IngressBackend,
        opts: &Options<'_>,
    ) {
        let Some(backend) = backend.service.as_ref() else {
            tracing::debug!(ingress = %meta, path, "backend does not reference a service");
            return;
        };
        let port = match backend.port.as_ref() {
            Some(port) => match (port.number, port.name.as_deref()) {
                (Some(number), _) => PortRef::Number(number),
                (None, Some(name)) => PortRef::Name(name),
                (None, None) => return,
            },
            None => return,
        };

        let service = Meta::new(meta.namespace.clone(), backend.name.clone());
        let Some(upstream) = self.lookup_http_service(&service, port) else {
            return;
        };
        let cluster = self.cluster(upstream, 0, None);

        let route = Route {
            clusters: vec![cluster],
            https_upgrade: false,
            websocket: opts.websocket_routes.contains(path),
            prefix_rewrite: None,
            timeout: opts.timeout,
        };

        if opts.allow_http {
            let insecure = Route {
                https_upgrade: opts.force_tls,
                ..route.clone()
            };
            self.virtual_host(host).add_route(route_vertex(path, insecure));
        }

        if host != "*" {
            if let Some(svhost) = self.secure_virtual_hosts.get_mut(host) {
                svhost.virtual_host.add_route(route_vertex(path, route));
            }
        }
    }
}
