use ingress_controller_k8s_api::{Resource, ResourceExt};
use std::fmt;

/// Identifies an object within its kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Meta {
    pub namespace: String,
    pub name: String,
}

// === impl Meta ===

impl Meta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Reads the object's identity. Unset fields are empty.
    pub fn of<T: Resource>(obj: &T) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.meta().name.clone().unwrap_or_default(),
        }
    }

    /// Parses a `namespace/name` reference, defaulting to `namespace` when the reference is
    /// unqualified.
    pub(crate) fn parse_ref(reference: &str, namespace: &str) -> Self {
        match reference.split_once('/') {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::new(namespace, reference),
        }
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
