use crate::{
    index::{self, BuildConfig, Cache, CacheConfig, ListenerConfig},
    k8s::{self, Resource},
    Rebuild,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{path::PathBuf, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "ingress", about = "An Ingress and IngressRoute controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress=info,warn",
        env = "INGRESS_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The ingress class claimed by this controller.
    #[clap(long, default_value = k8s::DEFAULT_INGRESS_CLASS)]
    ingress_class: String,

    /// Namespaces in which root IngressRoutes may be defined. All namespaces are permitted when
    /// unset.
    #[clap(long, value_delimiter = ',')]
    ingressroute_root_namespaces: Vec<String>,

    /// Upgrades insecure requests to HTTPS even on routes that permit insecure requests.
    #[clap(long)]
    disable_permit_insecure: bool,

    #[clap(long, default_value = "0.0.0.0")]
    http_address: String,

    #[clap(long, default_value = "8080")]
    http_port: u16,

    #[clap(long, default_value = "0.0.0.0")]
    https_address: String,

    #[clap(long, default_value = "8443")]
    https_port: u16,

    /// How often the cache is checked for changes to compile.
    #[clap(long, default_value = "500")]
    rebuild_interval_ms: u64,

    /// Writes each compiled graph to this path in DOT format.
    #[clap(long)]
    dot_path: Option<PathBuf>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            ingress_class,
            ingressroute_root_namespaces,
            disable_permit_insecure,
            http_address,
            http_port,
            https_address,
            https_port,
            rebuild_interval_ms,
            dot_path,
        } = self;

        let cache = Cache::shared(CacheConfig {
            ingress_class: Some(ingress_class),
            ingress_route_root_namespaces: ingressroute_root_namespaces,
        });
        let build_config = BuildConfig {
            disable_permit_insecure,
            http_listener: ListenerConfig {
                address: http_address,
                port: http_port,
            },
            https_listener: ListenerConfig {
                address: https_address,
                port: https_port,
            },
        };

        let mut prom = <Registry>::default();
        index::metrics::register(
            prom.sub_registry_with_prefix("ingress"),
            cache.clone(),
        );
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        info!(
            ingress_class = %cache.read().ingress_class(),
            "Watching resources"
        );

        // Spawn resource watches.

        let secrets = runtime.watch_all::<k8s::Secret>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(cache.clone(), secrets).instrument(info_span!("secrets")),
        );

        let services = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(cache.clone(), services).instrument(info_span!("services")),
        );

        let ingresses = runtime.watch_all::<k8s::Ingress>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(cache.clone(), ingresses)
                .instrument(info_span!("ingresses")),
        );

        if api_resource_exists::<k8s::IngressRoute>(&runtime.client()).await {
            let ingress_routes =
                runtime.watch_all::<k8s::IngressRoute>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(cache.clone(), ingress_routes)
                    .instrument(info_span!("ingressroutes.contour.heptio.com")),
            );
        } else {
            tracing::warn!(
                "ingressroutes.contour.heptio.com resource kind not found, skipping watches"
            );
        }

        if api_resource_exists::<k8s::TLSCertificateDelegation>(&runtime.client()).await {
            let delegations =
                runtime.watch_all::<k8s::TLSCertificateDelegation>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(cache.clone(), delegations)
                    .instrument(info_span!("tlscertificatedelegations.contour.heptio.com")),
            );
        } else {
            tracing::warn!(
                "tlscertificatedelegations.contour.heptio.com resource kind not found, skipping watches"
            );
        }

        // Compile the cache as it changes.
        let mut rebuild = Rebuild::new(
            cache,
            build_config,
            Duration::from_millis(rebuild_interval_ms),
        );
        if let Some(path) = dot_path {
            rebuild = rebuild.with_dot_path(path);
        }
        tokio::spawn(rebuild.run().instrument(info_span!("rebuild")));

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn api_resource_exists<T>(client: &kube::Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}
