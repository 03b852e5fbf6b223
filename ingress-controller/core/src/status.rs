//! Build outcomes for the objects that define virtual hosts.
//!
//! An object that cannot be compiled does not fail the build; it is left out of the graph and its
//! status records why.

use std::fmt;

/// Identifies a source object by kind, namespace, and name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef {
    pub kind: &'static str,
    pub namespace: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Valid,
    Invalid,

    /// Not a root and not reachable through delegation from any root.
    Orphaned,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectStatus {
    pub status: Status,
    pub description: String,

    /// The host the object contributes to, if known.
    pub vhost: Option<String>,
}

// === impl ObjectRef ===

impl ObjectRef {
    pub fn new(kind: &'static str, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

// === impl ObjectStatus ===

impl ObjectStatus {
    pub fn valid(vhost: impl Into<String>) -> Self {
        Self {
            status: Status::Valid,
            description: "valid IngressRoute".to_string(),
            vhost: Some(vhost.into()),
        }
    }

    pub fn invalid(description: impl Into<String>, vhost: Option<String>) -> Self {
        Self {
            status: Status::Invalid,
            description: description.into(),
            vhost,
        }
    }

    pub fn orphaned() -> Self {
        Self {
            status: Status::Orphaned,
            description: "this IngressRoute is not part of a delegation chain from a root IngressRoute"
                .to_string(),
            vhost: None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => "valid".fmt(f),
            Self::Invalid => "invalid".fmt(f),
            Self::Orphaned => "orphaned".fmt(f),
        }
    }
}
