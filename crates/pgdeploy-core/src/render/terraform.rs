//! Terraform descriptor for one primary and `replica_count` replicas on AWS.

use serde::{Deserialize, Serialize};

use super::escape::hcl_quote;
use crate::domain::topology::{PRIMARY_OUTPUT, REPLICA_OUTPUT};
use crate::domain::{InfrastructureDescriptor, ProvisionError, ProvisioningParameters};

/// Fixed parts of the descriptor that are not per-request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfrastructureSettings {
    pub region: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub ami: String,
    /// Name of the EC2 key pair installed on the instances.
    pub key_name: String,
}

impl Default for InfrastructureSettings {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            vpc_id: "vpc-088e27c25dc5bdb09".to_string(),
            subnet_id: "subnet-08608834300b6a90d".to_string(),
            ami: "ami-0b8c6b923777519db".to_string(),
            key_name: "ubuntu-key".to_string(),
        }
    }
}

/// Render the Terraform descriptor.
pub fn render_infrastructure(
    params: &ProvisioningParameters,
    settings: &InfrastructureSettings,
) -> Result<InfrastructureDescriptor, ProvisionError> {
    params.validate()?;

    let region = hcl_quote(&settings.region);
    let vpc_id = hcl_quote(&settings.vpc_id);
    let subnet_id = hcl_quote(&settings.subnet_id);
    let ami = hcl_quote(&settings.ami);
    let key_name = hcl_quote(&settings.key_name);
    let instance_type = hcl_quote(&params.instance_type);
    let replica_count = params.replica_count;

    let text = format!(
        r#"provider "aws" {{
  region = {region}
}}

variable "vpc_id" {{
  default = {vpc_id}
}}

variable "subnet_id" {{
  default = {subnet_id}
}}

resource "aws_security_group" "all_open_sg" {{
  name        = "all-open-sg"
  description = "Security Group that allows all inbound and outbound traffic"
  vpc_id      = var.vpc_id

  ingress {{
    from_port   = 0
    to_port     = 65535
    protocol    = "tcp"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  egress {{
    from_port   = 0
    to_port     = 65535
    protocol    = "tcp"
    cidr_blocks = ["0.0.0.0/0"]
  }}
}}

resource "aws_instance" "primary_postgresql" {{
  ami                    = {ami}
  instance_type          = {instance_type}
  subnet_id              = var.subnet_id
  vpc_security_group_ids = [aws_security_group.all_open_sg.id]
  key_name               = {key_name}
  tags = {{
    Name = "Primary PostgreSQL"
  }}
}}

resource "aws_instance" "replica_postgresql" {{
  count                  = {replica_count}
  ami                    = {ami}
  instance_type          = {instance_type}
  subnet_id              = var.subnet_id
  vpc_security_group_ids = [aws_security_group.all_open_sg.id]
  key_name               = {key_name}
  tags = {{
    Name = "Replica PostgreSQL"
  }}
}}

output "{PRIMARY_OUTPUT}" {{
  value       = aws_instance.primary_postgresql.public_ip
  description = "IP address of the primary PostgreSQL EC2 instance"
}}

output "{REPLICA_OUTPUT}" {{
  value       = [for r in aws_instance.replica_postgresql : r.public_ip]
  description = "IP addresses of the replica PostgreSQL EC2 instances"
}}
"#
    );

    Ok(InfrastructureDescriptor::new(text))
}
