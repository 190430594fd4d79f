//! Stage bodies shared by the sequencer and the single-request operations.
//!
//! Each body does the work and returns its value; `*_result` builds the
//! success record with the artifacts a caller gets to see.

use serde_json::json;
use tracing::info;

use crate::domain::{
    Artifact, ArtifactName, InventoryDocument, ProvisionError, ProvisionStep,
    ProvisioningParameters, SshCredentials, Stage, StageResult, Topology, extract, synthesize,
};
use crate::render::{RenderedDescriptors, render_all};

use super::builder::PipelineContext;
use super::configure::ConfigureOutput;
use super::provision::ApplyOutput;

pub(crate) async fn render(
    ctx: &PipelineContext,
    params: &ProvisioningParameters,
) -> Result<RenderedDescriptors, ProvisionError> {
    let rendered = render_all(params, &ctx.settings)?;
    ctx.store
        .write(
            ArtifactName::Infrastructure,
            rendered.infrastructure.as_str(),
        )
        .await?;
    ctx.store
        .write(ArtifactName::Configuration, rendered.configuration.as_str())
        .await?;
    info!(
        namespace = ctx.store.namespace(),
        instance_type = %params.instance_type,
        replica_count = params.replica_count,
        "descriptors rendered"
    );
    Ok(rendered)
}

/// Paths first, then the rendered text of each descriptor in the same order.
pub(crate) fn render_result(ctx: &PipelineContext, rendered: &RenderedDescriptors) -> StageResult {
    StageResult::success(Stage::Rendered, "infrastructure and configuration descriptors written")
        .with_artifact(path_artifact(ctx, ArtifactName::Infrastructure))
        .with_artifact(path_artifact(ctx, ArtifactName::Configuration))
        .with_artifact(Artifact::Text(rendered.infrastructure.as_str().to_string()))
        .with_artifact(Artifact::Text(rendered.configuration.as_str().to_string()))
}

pub(crate) async fn apply(ctx: &PipelineContext) -> Result<ApplyOutput, ProvisionError> {
    ctx.provisioner
        .apply(&ctx.store.path_of(ArtifactName::Infrastructure))
        .await
}

pub(crate) fn apply_result(ctx: &PipelineContext, out: &ApplyOutput) -> StageResult {
    let result = StageResult::success(Stage::Applied, "infrastructure applied")
        .with_artifact(path_artifact(ctx, ArtifactName::Infrastructure));
    match out.step(ProvisionStep::Apply) {
        Some(step) => result.with_artifact(Artifact::Stdout(step.stdout.clone())),
        None => result,
    }
}

pub(crate) async fn capture_topology(ctx: &PipelineContext) -> Result<Topology, ProvisionError> {
    let raw = ctx.provisioner.outputs(ctx.store.root()).await?;
    let topology = extract(&raw)?;
    info!(
        primary = %topology.primary_address,
        replicas = topology.replica_addresses.len(),
        "topology captured"
    );
    Ok(topology)
}

pub(crate) fn topology_result(topology: &Topology) -> StageResult {
    StageResult::success(Stage::TopologyCaptured, "host addresses captured")
        .with_artifact(topology_artifact(topology))
}

pub(crate) async fn write_inventory(
    ctx: &PipelineContext,
    topology: &Topology,
    credentials: &SshCredentials,
) -> Result<InventoryDocument, ProvisionError> {
    credentials.validate()?;
    let credentials = credentials.with_absolute_key_path()?;
    if ctx.require_key_file {
        credentials.ensure_key_readable().await?;
    }
    let inventory = synthesize(topology, &credentials)?;
    ctx.store
        .write(InventoryDocument::ARTIFACT, inventory.as_str())
        .await?;
    Ok(inventory)
}

pub(crate) fn inventory_result(ctx: &PipelineContext, inventory: &InventoryDocument) -> StageResult {
    StageResult::success(Stage::InventoryReady, "inventory written")
        .with_artifact(path_artifact(ctx, InventoryDocument::ARTIFACT))
        .with_artifact(Artifact::Text(inventory.as_str().to_string()))
}

pub(crate) async fn configure(ctx: &PipelineContext) -> Result<ConfigureOutput, ProvisionError> {
    ctx.configurator
        .configure(
            &ctx.store.path_of(ArtifactName::Inventory),
            &ctx.store.path_of(ArtifactName::Configuration),
        )
        .await
}

pub(crate) fn configure_result(out: &ConfigureOutput) -> StageResult {
    StageResult::success(Stage::Configured, "configuration applied")
        .with_artifact(Artifact::Stdout(out.stdout.clone()))
}

pub(crate) fn topology_artifact(topology: &Topology) -> Artifact {
    Artifact::Json(json!({
        "primary_address": topology.primary_address,
        "replica_addresses": topology.replica_addresses,
    }))
}

fn path_artifact(ctx: &PipelineContext, name: ArtifactName) -> Artifact {
    Artifact::FilePath(ctx.store.path_of(name).to_string_lossy().into_owned())
}
