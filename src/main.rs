use clap::Parser;
use sgtoggle_config::Settings;
use sgtoggle_core::Action;
use tracing_subscriber::EnvFilter;

mod toggle;

/// Open or close SSH access to an EC2 security group for this host's public IP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// `open` adds the ingress rule, `close` removes it.
    action: Action,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let settings = Settings::new()?;

    let toggle = toggle::Toggle { action: args.action };

    toggle.run(settings).await?;

    Ok(())
}
