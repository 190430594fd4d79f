use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use pgdeploy_core::app::{PipelineBuilder, PipelineConfig, PipelineContext, Sequencer, requests};
use pgdeploy_core::domain::{ProvisioningParameters, SshCredentials, StageResult};
use pgdeploy_core::observability;
use pgdeploy_core::ports::{IdGenerator, SystemClock, UlidGenerator};

mod cli;

use cli::{Cli, Command, CredentialArgs, GlobalArgs, ParamArgs};

/// Single-stage output: the stage result plus the namespace it ran in.
#[derive(Serialize)]
struct RequestOutput<'a> {
    namespace: &'a str,
    #[serde(flatten)]
    result: StageResult,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = observability::init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("warning: {e}");
    }

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Ok(false) means a stage failed; its payload has already been printed.
async fn dispatch(cli: Cli) -> Result<bool> {
    let config = load_config(&cli.global).await?;

    // Ctrl-C で実行中の terraform / ansible を止める
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight step");
            let _ = cancel_tx.send(true);
        }
    });
    let builder = PipelineBuilder::new(config).cancellation(cancel_rx);
    let ids = UlidGenerator::new(SystemClock);

    match cli.command {
        Command::Generate(args) => {
            let params = load_params(&args.params).await?;
            let namespace = args
                .namespace
                .unwrap_or_else(|| ids.generate_run_id().to_string());
            let ctx = open(builder, &namespace).await?;
            let result = requests::generate_descriptors(&ctx, &params).await;
            print_request(&ctx, result)
        }
        Command::Apply(args) => {
            let ctx = open(builder, &args.namespace).await?;
            let result = requests::apply_infrastructure(&ctx).await;
            print_request(&ctx, result)
        }
        Command::Inventory(args) => {
            let ctx = open(builder, &args.target.namespace).await?;
            let credentials = credentials(args.credentials);
            let result = requests::create_inventory(&ctx, &credentials).await;
            print_request(&ctx, result)
        }
        Command::Configure(args) => {
            let ctx = open(builder, &args.namespace).await?;
            let result = requests::configure_hosts(&ctx).await;
            print_request(&ctx, result)
        }
        Command::Run(args) => {
            let params = load_params(&args.params).await?;
            let credentials = credentials(args.credentials);
            let run_id = ids.generate_run_id();
            let ctx = builder
                .open_run(run_id)
                .await
                .with_context(|| format!("failed to prepare run {run_id}"))?;
            info!(%run_id, work_dir = %ctx.work_dir().display(), "starting pipeline");

            let report = Sequencer::new(ctx, run_id).run(&params, &credentials).await;
            print_json(&report)?;
            Ok(report.succeeded())
        }
    }
}

async fn load_config(global: &GlobalArgs) -> Result<PipelineConfig> {
    let mut config = match &global.config {
        Some(path) => PipelineConfig::load(path).await?,
        None => PipelineConfig::default(),
    };
    if let Some(work_root) = &global.work_root {
        config.work_root = work_root.clone();
    }
    Ok(config)
}

async fn open(builder: PipelineBuilder, namespace: &str) -> Result<PipelineContext> {
    builder
        .open(namespace)
        .await
        .with_context(|| format!("failed to open namespace {namespace}"))
}

async fn load_params(args: &ParamArgs) -> Result<ProvisioningParameters> {
    let mut params = match &args.params {
        Some(path) => read_params_file(path).await?,
        None => {
            let (Some(instance_type), Some(replica_count)) =
                (&args.instance_type, args.replica_count)
            else {
                bail!("--instance-type and --replica-count are required without --params");
            };
            ProvisioningParameters::new(instance_type.clone(), replica_count)
        }
    };
    if let Some(instance_type) = &args.instance_type {
        params.instance_type = instance_type.clone();
    }
    if let Some(replica_count) = args.replica_count {
        params.replica_count = replica_count;
    }
    if let Some(version) = &args.postgresql_version {
        params.postgresql_version = version.clone();
    }
    if let Some(max_connections) = args.max_connections {
        params.max_connections = max_connections;
    }
    Ok(params)
}

async fn read_params_file(path: &Path) -> Result<ProvisioningParameters> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read parameters {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse parameters {}", path.display()))
}

fn credentials(args: CredentialArgs) -> SshCredentials {
    SshCredentials::new(args.key_path, args.user)
}

fn print_request(ctx: &PipelineContext, result: StageResult) -> Result<bool> {
    let ok = result.is_success();
    print_json(&RequestOutput {
        namespace: ctx.store.namespace(),
        result,
    })?;
    Ok(ok)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}
