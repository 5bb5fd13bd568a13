use crate::{
    core::{validate_dns_label, Origin, Version, DEFAULT_FIELD_MANAGER, DEFAULT_HEADER},
    create::{self, Config},
    registry::KubeRegistry,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "preview", about = "Creates preview deployments behind an Istio mesh")]
pub struct Args {
    #[clap(
        long,
        global = true,
        default_value = "preview=info,warn",
        env = "PREVIEW_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, global = true, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deploys a preview version of a service and routes to it.
    Create(CreateArgs),
}

#[derive(Debug, clap::Args)]
struct CreateArgs {
    /// Preview version, e.g. a pull request number.
    #[clap(short = 'v', long)]
    version: Version,

    /// Name of the origin Service.
    #[clap(short = 's', long)]
    service: String,

    /// External URL the preview is served on.
    #[clap(short = 'u', long)]
    url: String,

    /// Istio Gateway the external route is bound to.
    #[clap(short = 'g', long, default_value = "my-gateway")]
    gateway: String,

    /// Namespace of the origin Service and Deployment.
    #[clap(long, default_value = "default")]
    namespace: String,

    /// Namespace new VirtualServices are written to.
    #[clap(long, default_value = "istio-system")]
    routing_namespace: String,

    #[clap(long, default_value = "cluster.local")]
    cluster_domain: String,

    /// Request header carrying the preview name.
    #[clap(long, default_value = DEFAULT_HEADER)]
    header: String,

    #[clap(long, default_value = DEFAULT_FIELD_MANAGER)]
    field_manager: String,

    /// Label of the origin selector to retag. Defaults to the first label.
    #[clap(long)]
    selector_key: Option<String>,

    /// Leaves objects created before a failure in place.
    #[clap(long)]
    no_rollback: bool,
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
            command,
        } = self;

        log_format
            .try_init(log_level)
            .context("failed to initialize logging")?;

        match command {
            Command::Create(args) => {
                let config = args.into_config()?;
                let client = client
                    .try_client()
                    .await
                    .context("failed to configure Kubernetes client")?;
                let registry =
                    KubeRegistry::new(client, &config.origin.namespace, &config.field_manager);
                let span = info_span!("create", origin = %config.origin, version = %config.version);
                create::create(&config, &registry, &registry)
                    .instrument(span)
                    .await?;
            }
        }

        Ok(())
    }
}

// === impl CreateArgs ===

impl CreateArgs {
    fn into_config(self) -> Result<Config> {
        let Self {
            version,
            service,
            url,
            gateway,
            namespace,
            routing_namespace,
            cluster_domain,
            header,
            field_manager,
            selector_key,
            no_rollback,
        } = self;

        validate_dns_label(&service).context("invalid --service")?;
        validate_dns_label(&namespace).context("invalid --namespace")?;
        validate_dns_label(&routing_namespace).context("invalid --routing-namespace")?;

        Ok(Config {
            origin: Origin::new(service, namespace, cluster_domain),
            version,
            url,
            gateway,
            routing_namespace,
            header,
            selector_key,
            field_manager,
            rollback: !no_rollback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("preview").chain(args.iter().copied()))
            .expect("arguments must parse")
    }

    fn create_args(args: Args) -> CreateArgs {
        match args.command {
            Command::Create(create) => create,
        }
    }

    #[test]
    fn defaults() {
        let args = create_args(parse(&[
            "create",
            "-v",
            "42",
            "-s",
            "checkout",
            "-u",
            "pr42.example.com",
        ]));
        let config = args.into_config().expect("config must be valid");
        assert_eq!(config.origin.service, "checkout");
        assert_eq!(config.origin.namespace, "default");
        assert_eq!(config.origin.cluster_domain, "cluster.local");
        assert_eq!(config.version.as_str(), "42");
        assert_eq!(config.url, "pr42.example.com");
        assert_eq!(config.gateway, "my-gateway");
        assert_eq!(config.routing_namespace, "istio-system");
        assert_eq!(config.header, "X-PREVIEW");
        assert_eq!(config.field_manager, "preview");
        assert_eq!(config.selector_key, None);
        assert!(config.rollback);
    }

    #[test]
    fn overrides() {
        let args = create_args(parse(&[
            "create",
            "--version",
            "7",
            "--service",
            "cart",
            "--url",
            "https://pr7.example.com",
            "--gateway",
            "edge",
            "--namespace",
            "shop",
            "--routing-namespace",
            "mesh",
            "--selector-key",
            "app",
            "--no-rollback",
        ]));
        let config = args.into_config().expect("config must be valid");
        assert_eq!(config.origin.namespace, "shop");
        assert_eq!(config.gateway, "edge");
        assert_eq!(config.routing_namespace, "mesh");
        assert_eq!(config.selector_key.as_deref(), Some("app"));
        assert!(!config.rollback);
    }

    #[test]
    fn rejects_invalid_version() {
        let res = Args::try_parse_from([
            "preview", "create", "-v", "4-2", "-s", "checkout", "-u", "x.example.com",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_invalid_service() {
        let args = create_args(parse(&[
            "create",
            "-v",
            "42",
            "-s",
            "Checkout",
            "-u",
            "x.example.com",
        ]));
        assert!(args.into_config().is_err());
    }
}
