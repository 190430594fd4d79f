//! Command-line arguments for `pgdeploy`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pgdeploy",
    version,
    about = "Provision and configure a PostgreSQL primary/replica cluster",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Pipeline configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding one sub-directory per namespace
    #[arg(long, global = true, env = "PGDEPLOY_WORK_ROOT", value_name = "DIR")]
    pub work_root: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the infrastructure and configuration descriptors
    Generate(GenerateArgs),
    /// Run terraform init, plan and apply in a namespace
    Apply(NamespaceArgs),
    /// Read the applied topology and write the ansible inventory
    Inventory(InventoryArgs),
    /// Run the configuration playbook against the inventory
    Configure(NamespaceArgs),
    /// Run the whole pipeline in a fresh namespace
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct NamespaceArgs {
    /// Namespace created by `generate`
    #[arg(long, short = 'n')]
    pub namespace: String,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Namespace to write into; a new run id is used when omitted
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    #[command(flatten)]
    pub params: ParamArgs,
}

#[derive(Args, Debug)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub target: NamespaceArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Provisioning parameters, from a JSON file and/or flags (flags win).
#[derive(Args, Debug)]
pub struct ParamArgs {
    /// JSON file with instance_type, replica_count, postgresql_version, max_connections
    #[arg(long, value_name = "FILE")]
    pub params: Option<PathBuf>,

    #[arg(long)]
    pub instance_type: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub replica_count: Option<i64>,

    #[arg(long)]
    pub postgresql_version: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub max_connections: Option<i64>,
}

#[derive(Args, Debug)]
pub struct CredentialArgs {
    /// Private key used by ansible to reach every host
    #[arg(long, value_name = "PATH")]
    pub key_path: PathBuf,

    /// SSH login user
    #[arg(long)]
    pub user: String,
}
