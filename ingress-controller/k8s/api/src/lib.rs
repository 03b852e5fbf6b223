#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;
pub mod contour;
pub mod duration;

pub use self::{
    annotations::{ingress_class, ingress_class_of, DEFAULT_INGRESS_CLASS},
    contour::{IngressRoute, IngressRouteSpec, TLSCertificateDelegation},
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Secret, Service, ServicePort, ServiceSpec},
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
        },
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
    ByteString,
};
pub use kube::core::{DynamicObject, Resource, ResourceExt};

/// The secret data key holding the PEM certificate chain.
pub const TLS_CERT_KEY: &str = "tls.crt";

/// The secret data key holding the PEM private key.
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";
