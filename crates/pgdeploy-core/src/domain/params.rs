//! User-supplied inputs: provisioning parameters and SSH credentials.
//!
//! Both are deserialized leniently (serde defaults) and checked explicitly
//! with `validate()` before anything is rendered or written.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::ProvisionError;

pub const DEFAULT_POSTGRESQL_VERSION: &str = "17";
pub const DEFAULT_MAX_CONNECTIONS: i64 = 100;

/// Parameters that drive rendering of both descriptors.
///
/// `replica_count` and `max_connections` are signed so that negative input
/// coming from JSON or the command line is rejected with a validation error
/// instead of failing deserialization with an opaque message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningParameters {
    pub instance_type: String,

    #[serde(alias = "num_replicas")]
    pub replica_count: i64,

    #[serde(default = "default_postgresql_version")]
    pub postgresql_version: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: i64,
}

fn default_postgresql_version() -> String {
    DEFAULT_POSTGRESQL_VERSION.to_string()
}

fn default_max_connections() -> i64 {
    DEFAULT_MAX_CONNECTIONS
}

impl ProvisioningParameters {
    /// Parameters with the default version and connection limit.
    pub fn new(instance_type: impl Into<String>, replica_count: i64) -> Self {
        Self {
            instance_type: instance_type.into(),
            replica_count,
            postgresql_version: default_postgresql_version(),
            max_connections: default_max_connections(),
        }
    }

    pub fn with_postgresql_version(mut self, version: impl Into<String>) -> Self {
        self.postgresql_version = version.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: i64) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.instance_type.trim().is_empty() {
            return Err(ProvisionError::validation("instance_type must not be empty"));
        }
        if self.replica_count < 0 {
            return Err(ProvisionError::validation(format!(
                "replica_count must be >= 0 (got {})",
                self.replica_count
            )));
        }
        if self.max_connections <= 0 {
            return Err(ProvisionError::validation(format!(
                "max_connections must be positive (got {})",
                self.max_connections
            )));
        }
        let version = &self.postgresql_version;
        if version.is_empty()
            || version.starts_with('.')
            || !version.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            return Err(ProvisionError::validation(format!(
                "postgresql_version must look like \"17\" or \"16.4\" (got {version:?})"
            )));
        }
        Ok(())
    }
}

/// SSH login used for every inventory host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshCredentials {
    #[serde(alias = "key-path")]
    pub key_path: PathBuf,
    pub user: String,
}

impl SshCredentials {
    pub fn new(key_path: impl Into<PathBuf>, user: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            user: user.into(),
        }
    }

    /// Both fields are required, and neither may break the inventory host line.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.user.is_empty() {
            return Err(ProvisionError::validation("ssh user must not be empty"));
        }
        if self.user.chars().any(char::is_whitespace) {
            return Err(ProvisionError::validation(
                "ssh user must not contain whitespace",
            ));
        }
        let key = self.key_path.to_string_lossy();
        if key.is_empty() {
            return Err(ProvisionError::validation("ssh key path must not be empty"));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(ProvisionError::validation(
                "ssh key path must not contain whitespace",
            ));
        }
        Ok(())
    }

    /// Same login with the key path resolved against the current directory.
    ///
    /// ansible reads the inventory from another working directory, so a
    /// relative key path would point somewhere else.
    pub fn with_absolute_key_path(&self) -> Result<Self, ProvisionError> {
        let key_path = std::path::absolute(&self.key_path)
            .map_err(|e| ProvisionError::io(&self.key_path, e))?;
        Ok(Self {
            key_path,
            user: self.user.clone(),
        })
    }

    /// Hardening check: the private key file must exist and be readable.
    pub async fn ensure_key_readable(&self) -> Result<(), ProvisionError> {
        match tokio::fs::File::open(&self.key_path).await {
            Ok(_) => Ok(()),
            Err(e) => Err(ProvisionError::validation(format!(
                "ssh key {} is not readable: {e}",
                self.key_path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use rstest::rstest;

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let json = r#"{ "instance_type": "t3.micro", "replica_count": 2 }"#;
        let params: ProvisioningParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.postgresql_version, "17");
        assert_eq!(params.max_connections, 100);
        params.validate().unwrap();
    }

    #[test]
    fn relative_key_path_is_made_absolute() {
        let creds = SshCredentials::new("keys/id_rsa", "ubuntu")
            .with_absolute_key_path()
            .unwrap();
        assert!(creds.key_path.is_absolute());
        assert!(creds.key_path.ends_with("keys/id_rsa"));
        assert_eq!(creds.user, "ubuntu");

        let absolute = SshCredentials::new("/keys/id_rsa", "ubuntu");
        assert_eq!(absolute.with_absolute_key_path().unwrap(), absolute);
    }

    #[test]
    fn num_replicas_is_accepted_for_replica_count() {
        let json = r#"{ "instance_type": "t3.micro", "num_replicas": 3 }"#;
        let params: ProvisioningParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.replica_count, 3);
    }

    #[test]
    fn missing_instance_type_fails_to_deserialize() {
        let json = r#"{ "replica_count": 2 }"#;
        assert!(serde_json::from_str::<ProvisioningParameters>(json).is_err());
    }

    #[rstest]
    #[case::empty_instance_type(ProvisioningParameters::new("", 1))]
    #[case::blank_instance_type(ProvisioningParameters::new("   ", 1))]
    #[case::negative_replicas(ProvisioningParameters::new("t3.micro", -1))]
    #[case::zero_connections(ProvisioningParameters::new("t3.micro", 1).with_max_connections(0))]
    #[case::negative_connections(ProvisioningParameters::new("t3.micro", 1).with_max_connections(-5))]
    #[case::empty_version(ProvisioningParameters::new("t3.micro", 1).with_postgresql_version(""))]
    #[case::injected_version(
        ProvisioningParameters::new("t3.micro", 1).with_postgresql_version("17\"\n  evil: true")
    )]
    fn invalid_parameters_are_rejected(#[case] params: ProvisioningParameters) {
        let err = params.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[rstest]
    #[case("17")]
    #[case("16.4")]
    fn version_forms_are_accepted(#[case] version: &str) {
        ProvisioningParameters::new("t3.micro", 0)
            .with_postgresql_version(version)
            .validate()
            .unwrap();
    }

    #[rstest]
    #[case::empty_user(SshCredentials::new("/home/u/key.pem", ""))]
    #[case::empty_key(SshCredentials::new("", "ubuntu"))]
    #[case::user_with_space(SshCredentials::new("/home/u/key.pem", "ubuntu extra=1"))]
    #[case::key_with_newline(SshCredentials::new("/home/u/key.pem\n[primary]", "ubuntu"))]
    fn invalid_credentials_are_rejected(#[case] creds: SshCredentials) {
        assert_eq!(creds.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn credentials_accept_original_key_path_spelling() {
        let json = r#"{ "key-path": "/home/u/key.pem", "user": "ubuntu" }"#;
        let creds: SshCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.key_path, PathBuf::from("/home/u/key.pem"));
        creds.validate().unwrap();
    }

    #[tokio::test]
    async fn key_readability_is_checked_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.pem");

        let creds = SshCredentials::new(&key, "ubuntu");
        assert_eq!(
            creds.ensure_key_readable().await.unwrap_err().kind(),
            ErrorKind::Validation
        );

        std::fs::write(&key, "-----BEGIN KEY-----").unwrap();
        creds.ensure_key_readable().await.unwrap();
    }
}
