use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{BoxError, Error};

pub const SSH_PORT: u16 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open,
    Close,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Open => f.write_str("open"),
            Action::Close => f.write_str("close"),
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Action::Open),
            "close" => Ok(Action::Close),
            other => Err(Error::UnknownAction(other.into())),
        }
    }
}

/// Inbound tcp rule admitting a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub group_id: String,
    pub addr: IpAddr,
    pub port: u16,
}

impl IngressRule {
    pub fn new(group_id: impl Into<String>, addr: IpAddr) -> Self {
        Self {
            group_id: group_id.into(),
            addr,
            port: SSH_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn protocol(&self) -> &'static str {
        "tcp"
    }

    /// Host-sized prefix for the address.
    pub fn cidr(&self) -> String {
        match self.addr {
            IpAddr::V4(addr) => format!("{addr}/32"),
            IpAddr::V6(addr) => format!("{addr}/128"),
        }
    }
}

/// Provider failures, classified by what they mean for the rule.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The rule is already present.
    #[error(transparent)]
    Duplicate(BoxError),
    /// The rule does not exist.
    #[error(transparent)]
    NotFound(BoxError),
    #[error(transparent)]
    Other(BoxError),
}

impl ProviderError {
    pub fn into_source(self) -> BoxError {
        match self {
            ProviderError::Duplicate(e) | ProviderError::NotFound(e) | ProviderError::Other(e) => e,
        }
    }
}

#[async_trait]
pub trait SecurityGroupApi: Send + Sync {
    async fn authorize_ingress(&self, rule: &IngressRule) -> Result<(), ProviderError>;

    async fn revoke_ingress(&self, rule: &IngressRule) -> Result<(), ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    /// The group was already in the requested state.
    Unchanged,
}

pub struct RuleToggler<P> {
    provider: P,
}

impl<P: SecurityGroupApi> RuleToggler<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn apply(&self, action: Action, rule: &IngressRule) -> Result<Change, Error> {
        debug!("{action} {}:{} on {}", rule.cidr(), rule.port, rule.group_id);

        let res = match action {
            Action::Open => self.provider.authorize_ingress(rule).await,
            Action::Close => self.provider.revoke_ingress(rule).await,
        };

        match (action, res) {
            (_, Ok(())) => Ok(Change::Applied),
            (Action::Open, Err(ProviderError::Duplicate(_))) => {
                info!("{}:{} is already opened", rule.cidr(), rule.port);
                Ok(Change::Unchanged)
            }
            (Action::Close, Err(ProviderError::NotFound(_))) => {
                info!("{}:{} is already closed", rule.cidr(), rule.port);
                Ok(Change::Unchanged)
            }
            (_, Err(e)) => Err(Error::Provider(e.into_source())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    use super::*;
    use tracing_test::traced_test;

    #[derive(Clone, Copy)]
    enum Reply {
        Ok,
        Duplicate,
        NotFound,
        Denied,
    }

    struct MockGroups {
        reply: Reply,
        calls: Mutex<Vec<(&'static str, IngressRule)>>,
    }

    impl MockGroups {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: Mutex::new(vec![]),
            }
        }

        fn respond(&self, op: &'static str, rule: &IngressRule) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push((op, rule.clone()));
            match self.reply {
                Reply::Ok => Ok(()),
                Reply::Duplicate => Err(ProviderError::Duplicate(
                    "InvalidPermission.Duplicate: the rule already exists".into(),
                )),
                Reply::NotFound => Err(ProviderError::NotFound(
                    "InvalidPermission.NotFound: the rule does not exist".into(),
                )),
                Reply::Denied => Err(ProviderError::Other("access denied".into())),
            }
        }
    }

    #[async_trait]
    impl SecurityGroupApi for MockGroups {
        async fn authorize_ingress(&self, rule: &IngressRule) -> Result<(), ProviderError> {
            self.respond("authorize", rule)
        }

        async fn revoke_ingress(&self, rule: &IngressRule) -> Result<(), ProviderError> {
            self.respond("revoke", rule)
        }
    }

    fn rule() -> IngressRule {
        IngressRule::new("sg-0123456789", IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5)))
    }

    #[test]
    fn action_round_trips_through_str() {
        assert_eq!("open".parse::<Action>().unwrap(), Action::Open);
        assert_eq!("close".parse::<Action>().unwrap(), Action::Close);
        assert_eq!(Action::Close.to_string(), "close");
        assert!(matches!(
            "Open".parse::<Action>(),
            Err(Error::UnknownAction(s)) if s == "Open"
        ));
    }

    #[test]
    fn cidr_is_host_sized() {
        assert_eq!(rule().cidr(), "203.0.113.5/32");
        assert_eq!(rule().port, SSH_PORT);
        assert_eq!(rule().protocol(), "tcp");

        let v6 = IngressRule::new("sg-1", "2001:db8::1".parse().unwrap()).with_port(2222);
        assert_eq!(v6.cidr(), "2001:db8::1/128");
        assert_eq!(v6.port, 2222);
    }

    #[tokio::test]
    async fn open_and_close_call_matching_operation() {
        let toggler = RuleToggler::new(MockGroups::new(Reply::Ok));

        assert_eq!(toggler.apply(Action::Open, &rule()).await.unwrap(), Change::Applied);
        assert_eq!(toggler.apply(Action::Close, &rule()).await.unwrap(), Change::Applied);

        let calls = toggler.provider().calls.lock().unwrap();
        assert_eq!(
            calls.iter().map(|(op, _)| *op).collect::<Vec<_>>(),
            ["authorize", "revoke"]
        );
        assert!(calls.iter().all(|(_, r)| *r == rule()));
    }

    #[traced_test]
    #[tokio::test]
    async fn duplicate_on_open_is_success() {
        let toggler = RuleToggler::new(MockGroups::new(Reply::Duplicate));

        let change = toggler.apply(Action::Open, &rule()).await.unwrap();

        assert_eq!(change, Change::Unchanged);
        assert!(logs_contain("203.0.113.5/32:22 is already opened"));
    }

    #[traced_test]
    #[tokio::test]
    async fn not_found_on_close_is_success() {
        let toggler = RuleToggler::new(MockGroups::new(Reply::NotFound));

        let change = toggler.apply(Action::Close, &rule()).await.unwrap();

        assert_eq!(change, Change::Unchanged);
        assert!(logs_contain("203.0.113.5/32:22 is already closed"));
    }

    #[tokio::test]
    async fn unrelated_error_propagates_unchanged() {
        for action in [Action::Open, Action::Close] {
            let toggler = RuleToggler::new(MockGroups::new(Reply::Denied));

            let err = toggler.apply(action, &rule()).await.unwrap_err();

            assert!(matches!(err, Error::Provider(_)));
            assert_eq!(err.to_string(), "access denied");
        }
    }

    #[tokio::test]
    async fn mismatched_no_op_is_not_remapped() {
        let toggler = RuleToggler::new(MockGroups::new(Reply::NotFound));
        let err = toggler.apply(Action::Open, &rule()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "InvalidPermission.NotFound: the rule does not exist"
        );

        let toggler = RuleToggler::new(MockGroups::new(Reply::Duplicate));
        let err = toggler.apply(Action::Close, &rule()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
