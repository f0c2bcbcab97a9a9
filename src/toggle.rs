use anyhow::Result;
use tracing::debug;

use sgtoggle_config::Settings;
use sgtoggle_core::{Action, Change, RuleToggler};

pub struct Toggle {
    pub action: Action,
}

impl Toggle {
    pub async fn run(self, settings: Settings) -> Result<()> {
        debug!("settings: {settings:?}");

        let resolver = settings.resolver()?;

        let addr = resolver.resolve().await?;

        let rule = settings.rule(addr);

        println!("Trying to {} {}...", self.action, rule.cidr());

        let toggler = RuleToggler::new(settings.provider().await);

        if toggler.apply(self.action, &rule).await? == Change::Unchanged {
            debug!("{} left {} as it was", self.action, rule.group_id);
        }

        println!("{} success", self.action);

        Ok(())
    }
}
