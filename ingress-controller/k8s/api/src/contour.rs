//! Custom resources in the `contour.heptio.com/v1beta1` API group.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Describes a virtual host and the routes it serves, possibly by delegating
/// part of its path space to `IngressRoute`s in other namespaces.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "contour.heptio.com",
    version = "v1beta1",
    kind = "IngressRoute",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IngressRouteSpec {
    /// Set only on root `IngressRoute`s.
    pub virtualhost: Option<VirtualHost>,

    #[serde(default)]
    pub routes: Vec<Route>,

    pub tcpproxy: Option<TcpProxy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    pub fqdn: String,
    pub tls: Option<Tls>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tls {
    /// Either `name` or `namespace/name`. The latter requires a
    /// `TLSCertificateDelegation` in the secret's namespace.
    #[serde(default)]
    pub secret_name: String,

    pub minimum_protocol_version: Option<String>,

    /// Forwards TLS connections to the `tcpproxy` backends without
    /// terminating them.
    #[serde(default)]
    pub passthrough: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(rename = "match")]
    pub match_: String,

    #[serde(default)]
    pub services: Vec<Service>,

    pub delegate: Option<Delegate>,

    #[serde(default)]
    pub enable_websockets: bool,

    /// Serve this route over plain HTTP even when the virtual host has TLS.
    #[serde(default)]
    pub permit_insecure: bool,

    pub prefix_rewrite: Option<String>,

    pub timeout_policy: Option<TimeoutPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TcpProxy {
    #[serde(default)]
    pub services: Vec<Service>,

    pub delegate: Option<Delegate>,
}

/// A backend `Service` in the referencing object's namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub port: u16,
    pub weight: Option<u32>,

    /// Load balancing strategy, e.g. `WeightedLeastRequest` or `Random`.
    pub strategy: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Delegate {
    pub name: String,

    /// Defaults to the delegating object's namespace.
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutPolicy {
    /// `infinity` or a duration such as `1m30s`.
    pub request: Option<String>,
}

/// Permits `IngressRoute`s and `Ingress`es in other namespaces to reference
/// TLS secrets in this object's namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "contour.heptio.com",
    version = "v1beta1",
    kind = "TLSCertificateDelegation",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TLSCertificateDelegationSpec {
    #[serde(default)]
    pub delegations: Vec<CertificateDelegation>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDelegation {
    pub secret_name: String,

    /// Namespaces permitted to use the secret. `*` permits all namespaces.
    #[serde(default)]
    pub target_namespaces: Vec<String>,
}

impl CertificateDelegation {
    pub fn permits(&self, namespace: &str) -> bool {
        self.target_namespaces
            .iter()
            .any(|ns| ns == "*" || ns == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_ingress_route() {
        let spec: IngressRouteSpec = serde_json::from_value(serde_json::json!({
            "virtualhost": {
                "fqdn": "example.com",
                "tls": { "secretName": "certs/wildcard", "minimumProtocolVersion": "1.2" }
            },
            "routes": [
                {
                    "match": "/",
                    "services": [{ "name": "web", "port": 80, "weight": 90 }],
                    "permitInsecure": true
                },
                {
                    "match": "/blog",
                    "delegate": { "name": "blog", "namespace": "marketing" }
                }
            ]
        }))
        .unwrap();

        let vhost = spec.virtualhost.as_ref().unwrap();
        assert_eq!(vhost.fqdn, "example.com");
        let tls = vhost.tls.as_ref().unwrap();
        assert_eq!(tls.secret_name, "certs/wildcard");
        assert!(!tls.passthrough);
        assert_eq!(spec.routes.len(), 2);
        assert_eq!(spec.routes[0].match_, "/");
        assert_eq!(spec.routes[0].services[0].weight, Some(90));
        assert!(spec.routes[0].permit_insecure);
        assert_eq!(
            spec.routes[1].delegate,
            Some(Delegate {
                name: "blog".to_string(),
                namespace: Some("marketing".to_string()),
            })
        );
        assert!(spec.tcpproxy.is_none());
    }

    #[test]
    fn delegation_permits() {
        let wildcard = CertificateDelegation {
            secret_name: "wildcard".to_string(),
            target_namespaces: vec!["*".to_string()],
        };
        assert!(wildcard.permits("anything"));

        let scoped = CertificateDelegation {
            secret_name: "scoped".to_string(),
            target_namespaces: vec!["a".to_string(), "b".to_string()],
        };
        assert!(scoped.permits("b"));
        assert!(!scoped.permits("c"));
    }
}
