use std::{fmt, path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use sgtoggle_core::{
    Ec2SecurityGroups, IngressRule, IpResolver, DEFAULT_ENDPOINTS, DEFAULT_TIMEOUT, SSH_PORT,
};

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Security group holding the ingress rule
    pub security_group_id: String,
    /// AWS access key id
    pub access_key_id: String,
    /// AWS secret access key
    pub secret_access_key: String,
    /// AWS region of the security group
    pub region: String,
    /// TCP port opened or closed
    pub port: u16,
    /// Deadline for the public ip lookup, e.g. `5s` or `750ms`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// IP echo services raced against each other
    pub endpoints: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            security_group_id: Default::default(),
            access_key_id: Default::default(),
            secret_access_key: Default::default(),
            region: Default::default(),
            port: SSH_PORT,
            timeout: DEFAULT_TIMEOUT,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("security_group_id", &self.security_group_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

pub fn proj_dirs() -> Result<ProjectDirs, ConfigError> {
    let proj_dirs = ProjectDirs::from("", "", "sgtoggle")
        .ok_or(ConfigError::NotFound("ProjectDirs".into()))?;
    Ok(proj_dirs)
}

fn default_config(proj_dirs: &ProjectDirs) -> PathBuf {
    proj_dirs.config_dir().join("default")
}

/// `AWS_SECURITY_GROUP_ID`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`.
pub fn aws_environment() -> Environment {
    Environment::with_prefix("aws")
}

/// `SGTOGGLE_PORT`, `SGTOGGLE_TIMEOUT` and the comma separated `SGTOGGLE_ENDPOINTS`.
pub fn environment() -> Environment {
    Environment::with_prefix("sgtoggle")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("endpoints")
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match proj_dirs() {
            Ok(proj_dirs) => {
                builder =
                    builder.add_source(File::from(default_config(&proj_dirs)).required(false));
            }
            Err(e) => tracing::debug!("skipping config file: {e}"),
        }

        let s = builder
            .add_source(aws_environment())
            .add_source(environment())
            .build()?;

        Self::from_config(s)
    }

    /// Deserializes and checks that every required value is present.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let required = [
            ("security_group_id", &self.security_group_id),
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
            ("region", &self.region),
        ];

        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::NotFound((*name).into()));
        }

        Ok(self)
    }

    pub fn resolver(&self) -> Result<IpResolver, sgtoggle_core::Error> {
        IpResolver::new(&self.endpoints, self.timeout)
    }

    pub async fn provider(&self) -> Ec2SecurityGroups {
        Ec2SecurityGroups::new(&self.access_key_id, &self.secret_access_key, &self.region).await
    }

    pub fn rule(&self, addr: std::net::IpAddr) -> IngressRule {
        IngressRule::new(self.security_group_id.clone(), addr).with_port(self.port)
    }
}
