//! Template rendering: parameters -> descriptor text.
//!
//! Pure functions. Writing the results is the artifact store's job.

pub mod escape;
mod playbook;
mod terraform;

pub use playbook::render_configuration;
pub use terraform::{InfrastructureSettings, render_infrastructure};

use crate::domain::{
    ConfigurationDescriptor, InfrastructureDescriptor, ProvisionError, ProvisioningParameters,
};

/// Both descriptors for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDescriptors {
    pub infrastructure: InfrastructureDescriptor,
    pub configuration: ConfigurationDescriptor,
}

/// Render both descriptors, failing before either is produced if the input is invalid.
pub fn render_all(
    params: &ProvisioningParameters,
    settings: &InfrastructureSettings,
) -> Result<RenderedDescriptors, ProvisionError> {
    Ok(RenderedDescriptors {
        infrastructure: render_infrastructure(params, settings)?,
        configuration: render_configuration(params)?,
    })
}
