//! Inventory synthesis: topology + SSH credentials -> INI host groups.

use std::fmt::Write as _;

use super::descriptor::ArtifactName;
use super::errors::ProvisionError;
use super::params::SshCredentials;
use super::topology::Topology;

pub const PRIMARY_GROUP: &str = "primary";
pub const REPLICA_GROUP: &str = "replica";

/// INI-like inventory consumed by `ansible-playbook -i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryDocument(String);

impl InventoryDocument {
    pub const ARTIFACT: ArtifactName = ArtifactName::Inventory;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Build the inventory text.
///
/// Layout is fixed: a leading blank line, the `[primary]` group with one
/// host line, then the `[replica]` group with one host line per replica in
/// topology order. The `[replica]` header is emitted even with no replicas.
pub fn synthesize(
    topology: &Topology,
    credentials: &SshCredentials,
) -> Result<InventoryDocument, ProvisionError> {
    credentials.validate()?;
    check_address(&topology.primary_address)?;
    for address in &topology.replica_addresses {
        check_address(address)?;
    }

    let user = credentials.user.as_str();
    let key_path = credentials.key_path.to_string_lossy();

    let mut out = String::new();
    out.push('\n');
    let _ = writeln!(out, "[{PRIMARY_GROUP}]");
    push_host(&mut out, &topology.primary_address, user, &key_path);
    let _ = writeln!(out, "[{REPLICA_GROUP}]");
    for address in &topology.replica_addresses {
        push_host(&mut out, address, user, &key_path);
    }
    Ok(InventoryDocument(out))
}

fn push_host(out: &mut String, address: &str, user: &str, key_path: &str) {
    let _ = writeln!(
        out,
        "{address} ansible_ssh_user={user} ansible_ssh_private_key_file={key_path}"
    );
}

fn check_address(address: &str) -> Result<(), ProvisionError> {
    if address.is_empty() || address.chars().any(char::is_whitespace) {
        return Err(ProvisionError::validation(format!(
            "host address {address:?} is not usable in an inventory"
        )));
    }
    Ok(())
}
