//! Domain model: inputs, rendered artifacts, topology, inventory, outcomes.
//!
//! ここにある型と関数は I/O を行わない（`SshCredentials::ensure_key_readable`
//! を除く）。外部プロセスやファイルへのアクセスは ports 経由で app 層が行う。

pub mod descriptor;
pub mod errors;
pub mod ids;
pub mod inventory;
pub mod outcome;
pub mod params;
pub mod state;
pub mod topology;

pub use descriptor::{ArtifactName, ConfigurationDescriptor, InfrastructureDescriptor};
pub use errors::{ErrorKind, ProvisionError, ProvisionStep, ToolFailure};
pub use ids::RunId;
pub use inventory::{InventoryDocument, synthesize};
pub use outcome::{Artifact, PipelineReport, StageResult};
pub use params::{ProvisioningParameters, SshCredentials};
pub use state::{PipelineState, Stage};
pub use topology::{Topology, extract};
