//! Renders a [`Dag`] in the graphviz DOT language.

use crate::core::{Dag, Vertex, Visitor};
use std::io;

/// Writes the graph reachable from the DAG's roots as a DOT digraph.
///
/// Each vertex is rendered once as a record-shaped node, keyed by its identity, and each
/// parent/child relationship as a single edge. Record labels are wrapped in braces.
pub fn write_dot<W: io::Write>(dag: &Dag, out: &mut W) -> io::Result<()> {
    writeln!(out, "digraph DAG {{")?;
    writeln!(out, "rankdir=\"LR\"")?;

    let mut dot = Dot {
        out: &mut *out,
        error: None,
    };
    dag.walk(&mut dot);
    if let Some(error) = dot.error {
        return Err(error);
    }

    writeln!(out, "}}")
}

/// Writes nodes and edges as the walk reports them, keeping the first write error.
struct Dot<'w, W> {
    out: &'w mut W,
    error: Option<io::Error>,
}

impl<W: io::Write> Dot<'_, W> {
    fn write(&mut self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        if self.error.is_none() {
            if let Err(error) = f(self.out) {
                self.error = Some(error);
            }
        }
    }
}

impl<W: io::Write> Visitor for Dot<'_, W> {
    fn vertex(&mut self, vertex: &Vertex) {
        let id = vertex.id();
        let label = label(vertex);
        self.write(|out| writeln!(out, "\"{id}\" [shape=record, label=\"{{{label}}}\"]"));
    }

    fn edge(&mut self, parent: &Vertex, child: &Vertex) {
        let (parent, child) = (parent.id(), child.id());
        self.write(|out| writeln!(out, "\"{parent}\" -> \"{child}\""));
    }
}

fn label(vertex: &Vertex) -> String {
    match vertex {
        Vertex::Listener(l) => format!("listener|{}:{}", escape(&l.address), l.port),
        Vertex::Secret(s) => format!("secret|{}/{}", escape(&s.namespace), escape(&s.name)),
        Vertex::HttpService(s) => format!(
            "httpservice|{}/{}:{}",
            escape(&s.namespace),
            escape(&s.name),
            s.port
        ),
        Vertex::VirtualHost(vhost) => format!("http://{}", escape(&vhost.name)),
        Vertex::SecureVirtualHost(svhost) => {
            format!("https://{}", escape(&svhost.virtual_host.name))
        }
        Vertex::PrefixRoute(r) => format!("prefix|{}", escape(&r.prefix)),
        Vertex::RegexRoute(r) => format!("regex|{}", escape(&r.regex)),
        Vertex::TcpService(s) => format!(
            "tcpservice|{}/{}:{}",
            escape(&s.namespace),
            escape(&s.name),
            s.port
        ),
        Vertex::TcpProxy(_) => "tcpproxy".to_string(),
        Vertex::Cluster(c) => format!("cluster|{{{}|weight {}}}", escape(&c.name()), c.weight),
    }
}

/// Escapes characters that are significant in record labels.
fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '{' | '}' | '|' | '<' | '>' | '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Cluster, HttpService, Listener, PrefixRoute, RegexRoute, Route, SecureVirtualHost,
        TcpProxy, TcpService, TlsVersion, VirtualHost,
    };
    use std::{collections::BTreeMap, sync::Arc};

    fn render(dag: &Dag) -> String {
        let mut out = Vec::new();
        write_dot(dag, &mut out).expect("writing to a vec must succeed");
        String::from_utf8(out).expect("output must be utf-8")
    }

    #[test]
    fn empty() {
        assert_eq!(render(&Dag::default()), "digraph DAG {\nrankdir=\"LR\"\n}\n");
    }

    #[test]
    fn shared_vertices_are_rendered_once() {
        let cluster = Arc::new(Cluster {
            upstream: Arc::new(HttpService {
                namespace: "default".to_string(),
                name: "web".to_string(),
                port: 80,
                port_name: None,
            }),
            weight: 5,
            load_balancer_strategy: None,
        });
        let route = |prefix: &str| {
            Vertex::PrefixRoute(Arc::new(PrefixRoute {
                prefix: prefix.to_string(),
                route: Route {
                    clusters: vec![cluster.clone()],
                    ..Default::default()
                },
            }))
        };

        let mut vhost = VirtualHost::new("example.com");
        vhost.add_route(route("/"));
        vhost.add_route(route("/api"));
        vhost.add_route(Vertex::RegexRoute(Arc::new(RegexRoute {
            regex: "/(a|b)".to_string(),
            route: Route::default(),
        })));
        let listener = Vertex::Listener(Arc::new(Listener {
            address: "0.0.0.0".to_string(),
            port: 8080,
            virtual_hosts: BTreeMap::from([(
                "example.com".to_string(),
                Vertex::VirtualHost(Arc::new(vhost)),
            )]),
        }));
        let dot = render(&Dag::new(vec![listener], BTreeMap::new()));

        assert_eq!(dot.matches("label=\"{cluster|{default/web/80|weight 5}}\"").count(), 1);
        assert_eq!(dot.matches("label=\"{httpservice|default/web:80}\"").count(), 1);
        assert!(dot.contains("label=\"{listener|0.0.0.0:8080}\""));
        assert!(dot.contains("label=\"{http://example.com}\""));
        assert!(dot.contains("label=\"{prefix|/api}\""));
        assert!(dot.contains("label=\"{regex|/(a\\|b)}\""));

        // listener -> vhost, vhost -> 3 routes, 2 routes -> cluster, cluster -> service
        assert_eq!(dot.matches(" -> ").count(), 7);
    }

    #[test]
    fn secure_virtual_hosts() {
        let svhost = SecureVirtualHost {
            virtual_host: VirtualHost::new("db.example.com"),
            min_tls_version: TlsVersion::default(),
            secret: None,
            tcp_proxy: Some(Arc::new(TcpProxy {
                services: vec![Arc::new(TcpService {
                    namespace: "default".to_string(),
                    name: "db".to_string(),
                    port: 5432,
                })],
            })),
        };
        let listener = Vertex::Listener(Arc::new(Listener {
            address: "0.0.0.0".to_string(),
            port: 8443,
            virtual_hosts: BTreeMap::from([(
                "db.example.com".to_string(),
                Vertex::SecureVirtualHost(Arc::new(svhost)),
            )]),
        }));
        let dot = render(&Dag::new(vec![listener], BTreeMap::new()));

        assert!(dot.contains("label=\"{https://db.example.com}\""));
        assert!(dot.contains("label=\"{tcpproxy}\""));
        assert!(dot.contains("label=\"{tcpservice|default/db:5432}\""));
        assert_eq!(dot.matches(" -> ").count(), 3);
    }
}
