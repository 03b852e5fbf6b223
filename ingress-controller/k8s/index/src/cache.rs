use crate::Meta;
use ahash::AHashMap as HashMap;
use ingress_controller_k8s_api::{
    self as k8s, DynamicObject, Ingress, IngressRoute, Secret, Service, TLSCertificateDelegation,
};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};

pub type SharedCache = Arc<RwLock<Cache>>;

/// Configures which objects a cache claims.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// The ingress class claimed by this controller. Unset (or empty) claims
    /// [`k8s::DEFAULT_INGRESS_CLASS`].
    pub ingress_class: Option<String>,

    /// Namespaces in which root `IngressRoute`s may be defined. Empty permits all namespaces.
    pub ingress_route_root_namespaces: Vec<String>,
}

/// Holds the latest accepted state of each kind of object, keyed by identity.
///
/// Each kind has its own partition, created on first write. A partition holds at most one object
/// per identity: inserting an object whose identity is already present replaces it.
#[derive(Debug)]
pub struct Cache {
    ingress_class: String,
    root_namespaces: Vec<String>,

    /// Incremented by every change.
    generation: u64,

    secrets: Option<HashMap<Meta, Secret>>,
    services: Option<HashMap<Meta, Service>>,
    ingresses: Option<HashMap<Meta, Ingress>>,
    ingress_routes: Option<HashMap<Meta, IngressRoute>>,
    delegations: Option<HashMap<Meta, TLSCertificateDelegation>>,
}

/// An object offered to the cache.
#[derive(Clone, Debug)]
pub enum Resource {
    Secret(Secret),
    Service(Service),
    Ingress(Ingress),
    IngressRoute(IngressRoute),
    TlsCertificateDelegation(TLSCertificateDelegation),

    /// A deletion whose final state was not observed. Holds the last known state of the object.
    DeletedFinalStateUnknown {
        key: String,
        obj: Box<Resource>,
    },

    /// A kind the cache does not hold.
    Other(DynamicObject),
}

/// The kinds of object held by the cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Secret,
    Service,
    Ingress,
    IngressRoute,
    TlsCertificateDelegation,
}

/// The number of objects of each kind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub secrets: usize,
    pub services: usize,
    pub ingresses: usize,
    pub ingress_routes: usize,
    pub delegations: usize,
}

// === impl Cache ===

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let ingress_class = config
            .ingress_class
            .filter(|class| !class.is_empty())
            .unwrap_or_else(|| k8s::DEFAULT_INGRESS_CLASS.to_string());
        Self {
            ingress_class,
            root_namespaces: config.ingress_route_root_namespaces,
            generation: 0,
            secrets: None,
            services: None,
            ingresses: None,
            ingress_routes: None,
            delegations: None,
        }
    }

    pub fn shared(config: CacheConfig) -> SharedCache {
        Arc::new(RwLock::new(Self::new(config)))
    }

    /// Inserts an object, replacing any object of the same kind and identity.
    ///
    /// Returns false if the object is not of interest: either its kind is not held by the cache,
    /// or it is an `Ingress`/`IngressRoute` annotated with another controller's ingress class.
    pub fn insert(&mut self, resource: impl Into<Resource>) -> bool {
        let accepted = match resource.into() {
            Resource::Secret(secret) => upsert(&mut self.secrets, secret),
            Resource::Service(service) => upsert(&mut self.services, service),
            Resource::TlsCertificateDelegation(delegation) => {
                upsert(&mut self.delegations, delegation)
            }
            Resource::Ingress(ingress) => {
                if !self.claims(k8s::ingress_class_of(&ingress)) {
                    return false;
                }
                upsert(&mut self.ingresses, ingress)
            }
            Resource::IngressRoute(route) => {
                if !self.claims(k8s::ingress_class(&route.metadata)) {
                    return false;
                }
                upsert(&mut self.ingress_routes, route)
            }
            Resource::DeletedFinalStateUnknown { .. } | Resource::Other(_) => false,
        };
        if accepted {
            self.generation += 1;
        }
        accepted
    }

    /// Removes an object by kind and identity.
    ///
    /// Returns true if the cache held the object. Ingress classes are not considered.
    pub fn remove(&mut self, resource: impl Into<Resource>) -> bool {
        match resource.into() {
            Resource::DeletedFinalStateUnknown { obj, .. } => self.remove(*obj),
            Resource::Secret(secret) => self.remove_meta(Kind::Secret, &Meta::of(&secret)),
            Resource::Service(service) => self.remove_meta(Kind::Service, &Meta::of(&service)),
            Resource::Ingress(ingress) => self.remove_meta(Kind::Ingress, &Meta::of(&ingress)),
            Resource::IngressRoute(route) => {
                self.remove_meta(Kind::IngressRoute, &Meta::of(&route))
            }
            Resource::TlsCertificateDelegation(delegation) => {
                self.remove_meta(Kind::TlsCertificateDelegation, &Meta::of(&delegation))
            }
            Resource::Other(_) => false,
        }
    }

    /// Removes the object of the given kind and identity, returning true if it was held.
    pub fn remove_meta(&mut self, kind: Kind, meta: &Meta) -> bool {
        let removed = match kind {
            Kind::Secret => delete(&mut self.secrets, meta),
            Kind::Service => delete(&mut self.services, meta),
            Kind::Ingress => delete(&mut self.ingresses, meta),
            Kind::IngressRoute => delete(&mut self.ingress_routes, meta),
            Kind::TlsCertificateDelegation => delete(&mut self.delegations, meta),
        };
        if removed {
            self.generation += 1;
        }
        removed
    }

    /// The ingress class this cache claims.
    pub fn ingress_class(&self) -> &str {
        &self.ingress_class
    }

    pub fn root_namespaces(&self) -> &[String] {
        &self.root_namespaces
    }

    /// A counter that changes whenever the cache's contents change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn counts(&self) -> Counts {
        fn len<T>(partition: &Option<HashMap<Meta, T>>) -> usize {
            partition.as_ref().map_or(0, |objs| objs.len())
        }

        Counts {
            secrets: len(&self.secrets),
            services: len(&self.services),
            ingresses: len(&self.ingresses),
            ingress_routes: len(&self.ingress_routes),
            delegations: len(&self.delegations),
        }
    }

    pub fn len(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Objects without a class annotation are claimed by every controller.
    fn claims(&self, class: Option<&str>) -> bool {
        match class {
            None | Some("") => true,
            Some(class) => class == self.ingress_class,
        }
    }

    pub(crate) fn secrets(&self) -> Option<&HashMap<Meta, Secret>> {
        self.secrets.as_ref()
    }

    pub(crate) fn services(&self) -> Option<&HashMap<Meta, Service>> {
        self.services.as_ref()
    }

    pub(crate) fn ingresses(&self) -> Option<&HashMap<Meta, Ingress>> {
        self.ingresses.as_ref()
    }

    pub(crate) fn ingress_routes(&self) -> Option<&HashMap<Meta, IngressRoute>> {
        self.ingress_routes.as_ref()
    }

    pub(crate) fn delegations(&self) -> Option<&HashMap<Meta, TLSCertificateDelegation>> {
        self.delegations.as_ref()
    }
}

fn upsert<T: k8s::Resource>(partition: &mut Option<HashMap<Meta, T>>, obj: T) -> bool {
    let meta = Meta::of(&obj);
    tracing::trace!(%meta, "upserting");
    partition.get_or_insert_with(HashMap::default).insert(meta, obj);
    true
}

fn delete<T>(partition: &mut Option<HashMap<Meta, T>>, meta: &Meta) -> bool {
    let removed = partition
        .as_mut()
        .and_then(|objs| objs.remove(meta))
        .is_some();
    tracing::trace!(%meta, removed, "deleting");
    removed
}

impl kubert::index::IndexNamespacedResource<Secret> for Cache {
    fn apply(&mut self, secret: Secret) {
        self.insert(secret);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_meta(Kind::Secret, &Meta { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<Service> for Cache {
    fn apply(&mut self, service: Service) {
        self.insert(service);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_meta(Kind::Service, &Meta { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<Ingress> for Cache {
    fn apply(&mut self, ingress: Ingress) {
        let meta = Meta::of(&ingress);
        // An update may re-annotate a claimed object for another controller, in which case it
        // must no longer be served.
        if !self.insert(ingress) {
            self.remove_meta(Kind::Ingress, &meta);
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_meta(Kind::Ingress, &Meta { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<IngressRoute> for Cache {
    fn apply(&mut self, route: IngressRoute) {
        let meta = Meta::of(&route);
        if !self.insert(route) {
            self.remove_meta(Kind::IngressRoute, &meta);
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_meta(Kind::IngressRoute, &Meta { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<TLSCertificateDelegation> for Cache {
    fn apply(&mut self, delegation: TLSCertificateDelegation) {
        self.insert(delegation);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_meta(Kind::TlsCertificateDelegation, &Meta { namespace, name });
    }
}

// === impl Resource ===

impl Resource {
    /// Wraps an object whose deletion was observed without its final state.
    pub fn tombstone(obj: impl Into<Resource>) -> Self {
        let obj = Box::new(obj.into());
        let key = obj.meta().map(|meta| meta.to_string()).unwrap_or_default();
        Self::DeletedFinalStateUnknown { key, obj }
    }

    fn meta(&self) -> Option<Meta> {
        match self {
            Self::Secret(obj) => Some(Meta::of(obj)),
            Self::Service(obj) => Some(Meta::of(obj)),
            Self::Ingress(obj) => Some(Meta::of(obj)),
            Self::IngressRoute(obj) => Some(Meta::of(obj)),
            Self::TlsCertificateDelegation(obj) => Some(Meta::of(obj)),
            Self::DeletedFinalStateUnknown { obj, .. } => obj.meta(),
            Self::Other(obj) => Some(Meta::of(obj)),
        }
    }
}

impl From<Secret> for Resource {
    fn from(obj: Secret) -> Self {
        Self::Secret(obj)
    }
}

impl From<Service> for Resource {
    fn from(obj: Service) -> Self {
        Self::Service(obj)
    }
}

impl From<Ingress> for Resource {
    fn from(obj: Ingress) -> Self {
        Self::Ingress(obj)
    }
}

impl From<IngressRoute> for Resource {
    fn from(obj: IngressRoute) -> Self {
        Self::IngressRoute(obj)
    }
}

impl From<TLSCertificateDelegation> for Resource {
    fn from(obj: TLSCertificateDelegation) -> Self {
        Self::TlsCertificateDelegation(obj)
    }
}

impl From<DynamicObject> for Resource {
    fn from(obj: DynamicObject) -> Self {
        Self::Other(obj)
    }
}

// === impl Kind ===

impl Kind {
    pub const ALL: [Kind; 5] = [
        Kind::Secret,
        Kind::Service,
        Kind::Ingress,
        Kind::IngressRoute,
        Kind::TlsCertificateDelegation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Service => "service",
            Self::Ingress => "ingress",
            Self::IngressRoute => "ingressroute",
            Self::TlsCertificateDelegation => "tlscertificatedelegation",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl Counts ===

impl Counts {
    pub fn get(&self, kind: Kind) -> usize {
        match kind {
            Kind::Secret => self.secrets,
            Kind::Service => self.services,
            Kind::Ingress => self.ingresses,
            Kind::IngressRoute => self.ingress_routes,
            Kind::TlsCertificateDelegation => self.delegations,
        }
    }

    pub fn total(&self) -> usize {
        self.secrets + self.services + self.ingresses + self.ingress_routes + self.delegations
    }
}
