//! Rendered artifacts and the well-known names they are stored under.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known artifact names inside a run namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactName {
    /// Terraform descriptor.
    Infrastructure,
    /// Ansible playbook.
    Configuration,
    /// INI inventory synthesized from the topology.
    Inventory,
}

impl ArtifactName {
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactName::Infrastructure => "terraform.tf",
            ArtifactName::Configuration => "postgresql_playbook.yml",
            ArtifactName::Inventory => "hosts.ini",
        }
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Terraform descriptor text. Immutable once rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureDescriptor(String);

impl InfrastructureDescriptor {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub const ARTIFACT: ArtifactName = ArtifactName::Infrastructure;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ansible playbook text. Immutable once rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationDescriptor(String);

impl ConfigurationDescriptor {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub const ARTIFACT: ArtifactName = ArtifactName::Configuration;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
