//! Single-stage request operations.
//!
//! Each call runs one step against a namespace and always returns a
//! [`StageResult`]; failures are reported in it, never raised. Artifacts left
//! by earlier calls on the same namespace are picked up from the store.

use tracing::{Instrument, info_span};

use crate::domain::{ProvisionError, ProvisioningParameters, SshCredentials, Stage, StageResult};

use super::builder::PipelineContext;
use super::stages;

/// Render both descriptors and write them to the namespace.
pub async fn generate_descriptors(
    ctx: &PipelineContext,
    params: &ProvisioningParameters,
) -> StageResult {
    let span = info_span!("generate", namespace = ctx.store.namespace());
    let result = stages::render(ctx, params).instrument(span).await;
    StageResult::from_result(Stage::Rendered, &result, |r| stages::render_result(ctx, r))
}

/// Read the applied topology and write the inventory.
pub async fn create_inventory(ctx: &PipelineContext, credentials: &SshCredentials) -> StageResult {
    let span = info_span!("inventory", namespace = ctx.store.namespace());
    let result = async {
        let topology = stages::capture_topology(ctx).await?;
        let inventory = stages::write_inventory(ctx, &topology, credentials).await?;
        Ok::<_, ProvisionError>((topology, inventory))
    }
    .instrument(span)
    .await;
    StageResult::from_result(Stage::InventoryReady, &result, |(topology, inventory)| {
        stages::inventory_result(ctx, inventory).with_artifact(stages::topology_artifact(topology))
    })
}

/// Run init, plan and apply on the namespace's infrastructure descriptor.
pub async fn apply_infrastructure(ctx: &PipelineContext) -> StageResult {
    let span = info_span!("apply", namespace = ctx.store.namespace());
    let result = stages::apply(ctx).instrument(span).await;
    StageResult::from_result(Stage::Applied, &result, |r| stages::apply_result(ctx, r))
}

/// Run the configuration playbook against the namespace's inventory.
pub async fn configure_hosts(ctx: &PipelineContext) -> StageResult {
    let span = info_span!("configure", namespace = ctx.store.namespace());
    let result = stages::configure(ctx).instrument(span).await;
    StageResult::from_result(Stage::Configured, &result, stages::configure_result)
}
