use crate::{Ingress, ObjectMeta};

/// The ingress class claimed when none is configured.
pub const DEFAULT_INGRESS_CLASS: &str = "contour";

pub const INGRESS_CLASS: &str = "contour.heptio.com/ingress.class";
pub const KUBERNETES_INGRESS_CLASS: &str = "kubernetes.io/ingress.class";

pub const ALLOW_HTTP: &str = "kubernetes.io/ingress.allow-http";
pub const FORCE_SSL_REDIRECT: &str = "ingress.kubernetes.io/force-ssl-redirect";
pub const REQUEST_TIMEOUT: &str = "contour.heptio.com/request-timeout";
pub const WEBSOCKET_ROUTES: &str = "contour.heptio.com/websocket-routes";
pub const TLS_MINIMUM_PROTOCOL_VERSION: &str = "contour.heptio.com/tls-minimum-protocol-version";

/// Reads the object's ingress class annotation, preferring the
/// contour-specific key over the generic kubernetes one.
pub fn ingress_class(meta: &ObjectMeta) -> Option<&str> {
    let annotations = meta.annotations.as_ref()?;
    annotations
        .get(INGRESS_CLASS)
        .or_else(|| annotations.get(KUBERNETES_INGRESS_CLASS))
        .map(String::as_str)
}

/// The class an `Ingress` is annotated with, falling back to
/// `spec.ingressClassName` when no annotation is present.
pub fn ingress_class_of(ingress: &Ingress) -> Option<&str> {
    ingress_class(&ingress.metadata).or_else(|| {
        ingress
            .spec
            .as_ref()
            .and_then(|spec| spec.ingress_class_name.as_deref())
    })
}

pub fn annotation<'m>(meta: &'m ObjectMeta, key: &str) -> Option<&'m str> {
    meta.annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
}

/// Returns true only if the annotation is set to `"true"`.
pub fn annotation_is_true(meta: &ObjectMeta, key: &str) -> bool {
    annotation(meta, key) == Some("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IngressSpec;
    use maplit::btreemap;

    fn meta(annotations: std::collections::BTreeMap<String, String>) -> ObjectMeta {
        ObjectMeta {
            name: Some("web".to_string()),
            namespace: Some("default".to_string()),
            annotations: Some(annotations),
            ..Default::default()
        }
    }

    #[test]
    fn prefers_contour_class() {
        let meta = meta(btreemap! {
            INGRESS_CLASS.to_string() => "contour".to_string(),
            KUBERNETES_INGRESS_CLASS.to_string() => "nginx".to_string(),
        });
        assert_eq!(ingress_class(&meta), Some("contour"));
    }

    #[test]
    fn falls_back_to_kubernetes_class() {
        let meta = meta(btreemap! {
            KUBERNETES_INGRESS_CLASS.to_string() => "nginx".to_string(),
        });
        assert_eq!(ingress_class(&meta), Some("nginx"));
        assert_eq!(ingress_class(&ObjectMeta::default()), None);
    }

    #[test]
    fn ingress_class_name_is_a_fallback() {
        let mut ingress = Ingress {
            metadata: meta(Default::default()),
            spec: Some(IngressSpec {
                ingress_class_name: Some("nginx".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(ingress_class_of(&ingress), Some("nginx"));

        ingress.metadata = meta(btreemap! {
            INGRESS_CLASS.to_string() => "contour".to_string(),
        });
        assert_eq!(ingress_class_of(&ingress), Some("contour"));
    }

    #[test]
    fn annotation_booleans() {
        let meta = meta(btreemap! {
            FORCE_SSL_REDIRECT.to_string() => "true".to_string(),
            ALLOW_HTTP.to_string() => "false".to_string(),
        });
        assert!(annotation_is_true(&meta, FORCE_SSL_REDIRECT));
        assert!(!annotation_is_true(&meta, ALLOW_HTTP));
        assert_eq!(annotation(&meta, ALLOW_HTTP), Some("false"));
    }
}
