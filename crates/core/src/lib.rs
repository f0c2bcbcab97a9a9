mod ec2;
mod error;
mod resolver;
mod toggler;

pub use ec2::Ec2SecurityGroups;
pub use error::{BoxError, Error};
pub use resolver::{resolve, IpResolver, DEFAULT_ENDPOINTS, DEFAULT_TIMEOUT};
pub use toggler::{
    Action, Change, IngressRule, ProviderError, RuleToggler, SecurityGroupApi, SSH_PORT,
};
