use crate::Vertex;
use std::collections::BTreeMap;

/// A bound address serving a set of virtual hosts.
#[derive(Clone, Debug)]
pub struct Listener {
    pub address: String,
    pub port: u16,

    /// `VirtualHost` or `SecureVirtualHost` vertices, keyed by host name.
    pub virtual_hosts: BTreeMap<String, Vertex>,
}
