// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use kube_lease_manager::LeaseManagerBuilder;
use managedcluster_import::{
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_GRACE_SECS, KIND_MANAGED_CLUSTER,
        LEADER_LEASE_NAME,
    },
    context::Context,
    crd::ManagedCluster,
    import::remote::KubeRemoteApplier,
    manifests::HubSettings,
    metrics::Metrics,
    reconcilers::{error_requeue, is_orphan_cleanup_failure, reconcile_managed_cluster},
    store::KubeStore,
    watch,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch as leadership;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

/// Imports managed clusters into an Open Cluster Management hub
#[derive(Parser, Debug)]
#[command(name = "managedcluster-import-controller")]
#[command(version, about)]
struct Args {
    /// Hub API server URL rendered into agent bootstrap kubeconfigs
    /// (defaults to the URL this controller connects to)
    #[arg(long, env = "HUB_API_SERVER_URL")]
    hub_api_server_url: Option<String>,

    /// Base64-encoded CA bundle of the hub API server
    #[arg(long, env = "HUB_CA_BUNDLE")]
    hub_ca_bundle: Option<String>,

    /// Image of the registration agent
    #[arg(
        long,
        env = "REGISTRATION_IMAGE",
        default_value = "quay.io/open-cluster-management/registration:latest"
    )]
    registration_image: String,

    /// Image of the work agent
    #[arg(
        long,
        env = "WORK_IMAGE",
        default_value = "quay.io/open-cluster-management/work:latest"
    )]
    work_image: String,

    /// Bind address of the metrics and health endpoints
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    metrics_bind_address: SocketAddr,

    /// Enable leader election for HA deployments
    #[arg(long, env = "ENABLE_LEADER_ELECTION", default_value = "false")]
    leader_election: bool,

    /// Namespace of the leader election Lease
    #[arg(
        long,
        env = "POD_NAMESPACE",
        default_value = "open-cluster-management"
    )]
    leader_election_namespace: String,

    /// Identity held in the Lease (defaults to the pod hostname)
    #[arg(long, env = "POD_NAME")]
    leader_election_identity: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("import-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_logging() {
    // RUST_LOG selects levels (default info), RUST_LOG_FORMAT=json|text the output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_logging();
    info!("Starting ManagedCluster import controller");

    debug!("Initializing Kubernetes client");
    let kube_config = kube::Config::infer()
        .await
        .context("failed to load kubeconfig")?;
    let hub = HubSettings {
        api_server_url: args
            .hub_api_server_url
            .clone()
            .unwrap_or_else(|| kube_config.cluster_url.to_string()),
        ca_bundle: args.hub_ca_bundle.clone(),
        registration_image: args.registration_image.clone(),
        work_image: args.work_image.clone(),
    };
    let client = Client::try_from(kube_config)?;
    info!(hub = %hub.api_server_url, "Connected to hub API server");

    let metrics = Metrics::new()?;
    let ctx = Arc::new(Context::new(
        KubeStore::new(client.clone()),
        KubeRemoteApplier::new(client.clone()),
        hub,
        metrics.clone(),
    ));

    let metrics_server = serve_metrics(args.metrics_bind_address, metrics.clone());

    if !args.leader_election {
        tokio::select! {
            () = run_controller(client, ctx) => {
                info!("Controller stopped");
                Ok(())
            }
            result = metrics_server => {
                error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
                result?;
                anyhow::bail!("metrics server exited unexpectedly without error")
            }
        }
    } else {
        tokio::select! {
            result = run_as_leader(&args, client, ctx) => result,
            result = metrics_server => {
                error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
                result?;
                anyhow::bail!("metrics server exited unexpectedly without error")
            }
        }
    }
}

/// Wait for the lease, then run the controller until it stops or leadership is lost.
async fn run_as_leader(args: &Args, client: Client, ctx: Arc<Context>) -> Result<()> {
    let identity = args
        .leader_election_identity
        .clone()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| LEADER_LEASE_NAME.to_string());

    info!(
        namespace = %args.leader_election_namespace,
        identity = %identity,
        "Leader election enabled, waiting for lease {}",
        LEADER_LEASE_NAME
    );

    let manager = LeaseManagerBuilder::new(client.clone(), LEADER_LEASE_NAME)
        .with_namespace(&args.leader_election_namespace)
        .with_identity(&identity)
        .with_duration(DEFAULT_LEASE_DURATION_SECS)
        .with_grace(DEFAULT_LEASE_GRACE_SECS)
        .build()
        .await?;
    let (mut is_leader, lease_task) = manager.watch().await;

    while !*is_leader.borrow_and_update() {
        is_leader
            .changed()
            .await
            .context("lease manager stopped before acquiring leadership")?;
    }
    info!(identity = %identity, "Acquired leadership");
    ctx.metrics.record_leader_elected(&identity);

    let metrics = ctx.metrics.clone();
    let result = tokio::select! {
        () = run_controller(client, ctx) => {
            info!("Controller stopped");
            Ok(())
        }
        () = leadership_lost(&mut is_leader) => {
            metrics.record_leader_lost(&identity);
            Err(anyhow::anyhow!("lost leadership of lease {LEADER_LEASE_NAME}"))
        }
    };

    // Dropping the receiver makes the lease task release the lease and exit
    drop(is_leader);
    match lease_task.await {
        Ok(Ok(_)) => debug!("Lease released"),
        Ok(Err(e)) => warn!(error = %e, "Failed to release lease"),
        Err(e) => warn!(error = %e, "Lease task panicked"),
    }

    result
}

async fn leadership_lost(is_leader: &mut leadership::Receiver<bool>) {
    loop {
        if is_leader.changed().await.is_err() || !*is_leader.borrow_and_update() {
            return;
        }
    }
}

/// Run the `ManagedCluster` controller
async fn run_controller(client: Client, ctx: Arc<Context>) {
    info!("Starting ManagedCluster controller");

    let api = Api::<ManagedCluster>::all(client.clone());

    Controller::new(api, Config::default())
        .watches_stream(watch::manifest_work_changes(client), |work| {
            watch::owning_cluster(&work)
        })
        .shutdown_on_signal()
        .run(reconcile_managed_cluster_wrapper, error_policy, ctx)
        .for_each(|result| {
            if let Err(e) = result {
                debug!(error = %e, "Controller event");
            }
            futures::future::ready(())
        })
        .await;
}

/// Reconcile wrapper for `ManagedCluster`
async fn reconcile_managed_cluster_wrapper(
    cluster: Arc<ManagedCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = cluster.name_any();

    debug!(cluster = %name, "Reconcile wrapper called for ManagedCluster");

    match reconcile_managed_cluster(&ctx, &name).await {
        Ok(action) => {
            info!("Successfully reconciled ManagedCluster: {}", name);
            ctx.metrics
                .record_reconciliation_success(KIND_MANAGED_CLUSTER, start.elapsed());
            Ok(action)
        }
        Err(e) => {
            error!("Failed to reconcile ManagedCluster {}: {:#}", name, e);
            ctx.metrics
                .record_reconciliation_error(KIND_MANAGED_CLUSTER, start.elapsed());
            Err(e.into())
        }
    }
}

/// Error policy for the `ManagedCluster` controller
fn error_policy(_cluster: Arc<ManagedCluster>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    let reason = if is_orphan_cleanup_failure(&err.0) {
        "orphan_cleanup"
    } else {
        "error"
    };
    ctx.metrics.record_requeue(KIND_MANAGED_CLUSTER, reason);
    error_requeue(&err.0)
}

/// Serve `/metrics` and `/healthz`
async fn serve_metrics(addr: SocketAddr, metrics: Metrics) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(metrics);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics endpoint {addr}"))?;
    info!(addr = %addr, "Serving metrics");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler(State(metrics): State<Metrics>) -> Response {
    match metrics.gather() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
