use std::net::IpAddr;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::http::HttpResponse;
use aws_sdk_ec2::config::{Credentials, Region};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{IpPermission, IpRange, Ipv6Range};
use aws_sdk_ec2::Client;
use thiserror::Error;
use tracing::debug;

use crate::error::BoxError;
use crate::toggler::{IngressRule, ProviderError, SecurityGroupApi};

const DUPLICATE_PERMISSION: &str = "InvalidPermission.Duplicate";
const PERMISSION_NOT_FOUND: &str = "InvalidPermission.NotFound";

/// Security groups of one EC2 region, reached with static credentials.
#[derive(Debug, Clone)]
pub struct Ec2SecurityGroups {
    client: Client,
}

impl Ec2SecurityGroups {
    pub async fn new(access_key_id: &str, secret_access_key: &str, region: &str) -> Self {
        let credentials =
            Credentials::new(access_key_id, secret_access_key, None, None, "sgtoggle");

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .credentials_provider(credentials)
            .load()
            .await;

        Self::from_client(Client::new(&config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecurityGroupApi for Ec2SecurityGroups {
    async fn authorize_ingress(&self, rule: &IngressRule) -> Result<(), ProviderError> {
        debug!("authorize ingress {} on {}", rule.cidr(), rule.group_id);

        self.client
            .authorize_security_group_ingress()
            .group_id(&rule.group_id)
            .ip_permissions(ip_permission(rule))
            .dry_run(false)
            .send()
            .await
            .map(|_| ())
            .map_err(provider_error)
    }

    async fn revoke_ingress(&self, rule: &IngressRule) -> Result<(), ProviderError> {
        debug!("revoke ingress {} on {}", rule.cidr(), rule.group_id);

        self.client
            .revoke_security_group_ingress()
            .group_id(&rule.group_id)
            .ip_permissions(ip_permission(rule))
            .dry_run(false)
            .send()
            .await
            .map(|_| ())
            .map_err(provider_error)
    }
}

fn ip_permission(rule: &IngressRule) -> IpPermission {
    let permission = IpPermission::builder()
        .ip_protocol(rule.protocol())
        .from_port(i32::from(rule.port))
        .to_port(i32::from(rule.port));

    let permission = match rule.addr {
        IpAddr::V4(_) => permission.ip_ranges(IpRange::builder().cidr_ip(rule.cidr()).build()),
        IpAddr::V6(_) => {
            permission.ipv6_ranges(Ipv6Range::builder().cidr_ipv6(rule.cidr()).build())
        }
    };

    permission.build()
}

/// EC2 failure shown as `Code: message`, with the SDK error kept as source.
#[derive(Error, Debug)]
#[error("{summary}")]
struct Ec2Error {
    summary: String,
    source: BoxError,
}

fn provider_error<E>(err: SdkError<E, HttpResponse>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let (code, summary) = match err.as_service_error() {
        Some(e) => {
            let summary = match (e.code(), e.message()) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (Some(code), None) => code.to_owned(),
                (None, Some(message)) => message.to_owned(),
                (None, None) => DisplayErrorContext(&err).to_string(),
            };
            (e.code().map(str::to_owned), summary)
        }
        None => (None, DisplayErrorContext(&err).to_string()),
    };

    let source = Box::new(Ec2Error {
        summary,
        source: Box::new(err),
    });

    classify(code.as_deref(), source)
}

/// Maps an EC2 error code onto what it means for the rule.
fn classify(code: Option<&str>, source: BoxError) -> ProviderError {
    match code {
        Some(DUPLICATE_PERMISSION) => ProviderError::Duplicate(source),
        Some(PERMISSION_NOT_FOUND) => ProviderError::NotFound(source),
        _ => ProviderError::Other(source),
    }
}
