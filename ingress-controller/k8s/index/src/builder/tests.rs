use super::*;
use crate::{CacheConfig, Resource};
use ingress_controller_core::{RouteMatch, Status};
use ingress_controller_k8s_api::{
    contour, ByteString, IngressRouteSpec, ObjectMeta, ServicePort, ServiceSpec,
};
use maplit::btreemap;
use std::time::Duration;


pub(super) fn mk_meta(ns: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub(super) fn mk_secret(ns: &str, name: &str) -> Secret {
    Secret {
        metadata: mk_meta(ns, name),
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(btreemap! {
            k8s::TLS_CERT_KEY.to_string() => ByteString(b"cert".to_vec()),
            k8s::TLS_PRIVATE_KEY_KEY.to_string() => ByteString(b"key".to_vec()),
        }),
        ..Default::default()
    }
}

/// A service exposing each `(name, port)`.
pub(super) fn mk_service(ns: &str, name: &str, ports: &[(Option<&str>, i32)]) -> Service {
    Service {
        metadata: mk_meta(ns, name),
        spec: Some(ServiceSpec {
            ports: Some(
                ports
                    .iter()
                    .map(|&(name, port)| ServicePort {
                        name: name.map(str::to_string),
                        port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(super) fn mk_ingress_route(ns: &str, name: &str, spec: IngressRouteSpec) -> IngressRoute {
    IngressRoute {
        metadata: mk_meta(ns, name),
        spec,
    }
}

/// A root for `fqdn` without TLS.
pub(super) fn mk_root(fqdn: &str, routes: Vec<contour::Route>) -> IngressRouteSpec {
    IngressRouteSpec {
        virtualhost: Some(contour::VirtualHost {
            fqdn: fqdn.to_string(),
            tls: None,
        }),
        routes,
        tcpproxy: None,
    }
}

pub(super) fn mk_route(prefix: &str, services: &[(&str, u16)]) -> contour::Route {
    contour::Route {
        match_: prefix.to_string(),
        services: services
            .iter()
            .map(|&(name, port)| contour::Service {
                name: name.to_string(),
                port,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub(super) fn mk_delegate_route(prefix: &str, name: &str, ns: Option<&str>) -> contour::Route {
    contour::Route {
        match_: prefix.to_string(),
        delegate: Some(contour::Delegate {
            name: name.to_string(),
            namespace: ns.map(str::to_string),
        }),
        ..Default::default()
    }
}

pub(super) fn mk_cache(objs: impl IntoIterator<Item = Resource>) -> SharedCache {
    mk_cache_with(CacheConfig::default(), objs)
}

pub(super) fn mk_cache_with(
    config: CacheConfig,
    objs: impl IntoIterator<Item = Resource>,
) -> SharedCache {
    let cache = Cache::shared(config);
    {
        let mut cache = cache.write();
        for obj in objs {
            assert!(cache.insert(obj));
        }
    }
    cache
}

pub(super) fn build_default(objs: impl IntoIterator<Item = Resource>) -> Dag {
    build(&mk_cache(objs), &BuildConfig::default())
}

pub(super) fn listener(dag: &Dag, port: u16) -> Option<Arc<Listener>> {
    dag.roots().iter().find_map(|root| match root {
        Vertex::Listener(l) if l.port == port => Some(l.clone()),
        _ => None,
    })
}

pub(super) fn virtual_host(dag: &Dag, host: &str) -> Option<Arc<VirtualHost>> {
    match listener(dag, 8080)?.virtual_hosts.get(host)? {
        Vertex::VirtualHost(vhost) => Some(vhost.clone()),
        _ => None,
    }
}

pub(super) fn secure_virtual_host(dag: &Dag, host: &str) -> Option<Arc<SecureVirtualHost>> {
    match listener(dag, 8443)?.virtual_hosts.get(host)? {
        Vertex::SecureVirtualHost(svhost) => Some(svhost.clone()),
        _ => None,
    }
}

pub(super) fn prefix_route(vhost: &VirtualHost, prefix: &str) -> Option<Arc<PrefixRoute>> {
    match vhost.routes.get(&RouteMatch::Prefix(prefix.to_string()))? {
        Vertex::PrefixRoute(route) => Some(route.clone()),
        _ => None,
    }
}

pub(super) fn status(dag: &Dag, ns: &str, name: &str) -> Status {
    dag.status(INGRESS_ROUTE_KIND, ns, name)
        .unwrap_or_else(|| panic!("no status for {ns}/{name}"))
        .status
}

#[test]
fn empty_cache_builds_empty_dag() {
    let dag = build_default([]);
    assert!(dag.is_empty());
    assert!(dag.statuses().is_empty());
}

#[test]
fn listener_addresses_are_configurable() {
    let cache = mk_cache([
        mk_service("default", "web", &[(None, 80)]).into(),
        mk_ingress_route(
            "default",
            "web",
            mk_root("example.com", vec![mk_route("/", &[("web", 80)])]),
        )
        .into(),
    ]);
    let config = BuildConfig {
        http_listener: ListenerConfig {
            address: "127.0.0.1".to_string(),
            port: 9080,
        },
        ..Default::default()
    };

    let dag = build(&cache, &config);
    let l = listener(&dag, 9080).expect("listener must exist");
    assert_eq!(l.address, "127.0.0.1");
    assert!(l.virtual_hosts.contains_key("example.com"));
    assert!(listener(&dag, 8443).is_none(), "no secure hosts");
}

#[test]
fn shared_clusters_are_deduplicated() {
    let dag = build_default([
        mk_service("default", "web", &[(None, 80)]).into(),
        mk_ingress_route(
            "default",
            "web",
            mk_root(
                "example.com",
                vec![mk_route("/", &[("web", 80)]), mk_route("/api", &[("web", 80)])],
            ),
        )
        .into(),
    ]);

    let vhost = virtual_host(&dag, "example.com").expect("vhost must exist");
    let root = prefix_route(&vhost, "/").expect("route must exist");
    let api = prefix_route(&vhost, "/api").expect("route must exist");
    assert!(Arc::ptr_eq(&root.route.clusters[0], &api.route.clusters[0]));

    // The cluster is entered once, with an edge from each route.
    #[derive(Default)]
    struct Count {
        clusters: usize,
        cluster_edges: usize,
    }
    impl ingress_controller_core::Visitor for Count {
        fn vertex(&mut self, v: &Vertex) {
            if let Vertex::Cluster(_) = v {
                self.clusters += 1;
            }
        }

        fn edge(&mut self, _: &Vertex, child: &Vertex) {
            if let Vertex::Cluster(_) = child {
                self.cluster_edges += 1;
            }
        }
    }
    let mut count = Count::default();
    dag.walk(&mut count);
    assert_eq!(count.clusters, 1);
    assert_eq!(count.cluster_edges, 2);
}

#[test]
fn distinct_weights_are_distinct_clusters() {
    let mut weighted = mk_route("/", &[("web", 80)]);
    weighted.services[0].weight = Some(10);
    let dag = build_default([
        mk_service("default", "web", &[(None, 80)]).into(),
        mk_ingress_route(
            "default",
            "web",
            mk_root("example.com", vec![weighted, mk_route("/api", &[("web", 80)])]),
        )
        .into(),
    ]);

    let vhost = virtual_host(&dag, "example.com").expect("vhost must exist");
    let root = prefix_route(&vhost, "/").expect("route must exist");
    let api = prefix_route(&vhost, "/api").expect("route must exist");
    assert_eq!(root.route.clusters[0].weight, 10);
    assert_eq!(api.route.clusters[0].weight, 0);
    assert!(!Arc::ptr_eq(&root.route.clusters[0], &api.route.clusters[0]));
    assert!(Arc::ptr_eq(
        &root.route.clusters[0].upstream,
        &api.route.clusters[0].upstream
    ));
}

#[test]
fn rebuild_is_isomorphic() {
    let cache = mk_cache([
        mk_service("default", "web", &[(Some("http"), 80)]).into(),
        mk_service("default", "api", &[(None, 8080)]).into(),
        mk_ingress_route(
            "default",
            "web",
            mk_root(
                "example.com",
                vec![mk_route("/", &[("web", 80)]), mk_route("/api", &[("api", 8080)])],
            ),
        )
        .into(),
    ]);
    let config = BuildConfig::default();

    let a = build(&cache, &config);
    let b = build(&cache, &config);
    assert_eq!(format!("{:?}", a.roots()), format!("{:?}", b.roots()));
    assert_eq!(a.statuses(), b.statuses());

    // Rebuilding allocates new vertices.
    assert_ne!(a.roots()[0].id(), b.roots()[0].id());
}

#[test]
fn build_observes_a_consistent_snapshot() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .try_init()
        .ok();

    let cache = mk_cache([
        mk_service("default", "web", &[(None, 80)]).into(),
        mk_ingress_route(
            "default",
            "web",
            mk_root("a.example.com", vec![mk_route("/", &[("web", 80)])]),
        )
        .into(),
    ]);
    let config = BuildConfig::default();

    let guard = cache.read();

    let (tx, rx) = std::sync::mpsc::channel();
    let writer = {
        let cache = cache.clone();
        std::thread::spawn(move || {
            let mut cache = cache.write();
            cache.insert(mk_ingress_route(
                "default",
                "other",
                mk_root("b.example.com", vec![mk_route("/", &[("web", 80)])]),
            ));
            tx.send(()).expect("receiver must be alive");
        })
    };

    // The writer cannot proceed while a build holds the read lock.
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    let dag = Builder::new(&*guard, &config).build();
    let hosts = listener(&dag, 8080)
        .expect("listener must exist")
        .virtual_hosts
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(hosts, vec!["a.example.com".to_string()]);
    drop(guard);

    rx.recv().expect("writer must complete");
    writer.join().expect("writer must not panic");

    let dag = build(&cache, &config);
    let hosts = listener(&dag, 8080)
        .expect("listener must exist")
        .virtual_hosts
        .len();
    assert_eq!(hosts, 2);
}

#[test]
fn secrets_require_certificate_and_key() {
    let mut no_key = mk_secret("default", "no-key");
    no_key
        .data
        .as_mut()
        .expect("secret must have data")
        .remove(k8s::TLS_PRIVATE_KEY_KEY);
    let mut empty_cert = mk_secret("default", "empty-cert");
    empty_cert
        .data
        .as_mut()
        .expect("secret must have data")
        .insert(k8s::TLS_CERT_KEY.to_string(), ByteString(vec![]));

    let cache = mk_cache([
        mk_secret("default", "ok").into(),
        no_key.into(),
        empty_cert.into(),
    ]);
    let cache = cache.read();
    let config = BuildConfig::default();
    let mut state = State {
        source: &*cache,
        config: &config,
        secrets: HashMap::default(),
        services: HashMap::default(),
        tcp_services: HashMap::default(),
        clusters: HashMap::default(),
        virtual_hosts: BTreeMap::new(),
        secure_virtual_hosts: BTreeMap::new(),
        statuses: BTreeMap::new(),
    };

    let ok = state
        .lookup_secret(&Meta::new("default", "ok"))
        .expect("secret must be valid");
    assert_eq!(ok.cert, b"cert");
    assert!(Arc::ptr_eq(
        &ok,
        &state
            .lookup_secret(&Meta::new("default", "ok"))
            .expect("secret must be valid")
    ));
    assert!(state.lookup_secret(&Meta::new("default", "no-key")).is_none());
    assert!(state.lookup_secret(&Meta::new("default", "empty-cert")).is_none());
    assert!(state.lookup_secret(&Meta::new("default", "missing")).is_none());
}

#[test]
fn request_timeouts() {
    assert_eq!(parse_timeout(None), None);
    assert_eq!(parse_timeout(Some("")), None);
    assert_eq!(parse_timeout(Some("infinity")), Some(RequestTimeout::Infinite));
    assert_eq!(
        parse_timeout(Some("1m30s")),
        Some(RequestTimeout::After(Duration::from_secs(90)))
    );
    assert_eq!(parse_timeout(Some("soon")), Some(RequestTimeout::Infinite));
}
