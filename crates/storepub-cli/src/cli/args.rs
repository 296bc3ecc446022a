use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use storepub_core::{EndpointConfig, PollConfig, Revision};

#[derive(Parser, Debug)]
#[command(
    name = "storepub",
    version,
    about = "Publish snaps to the store with a persisted macaroon credential"
)]
pub struct Cli {
    #[command(flatten)]
    pub endpoints: EndpointArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in interactively and save the encrypted credential
    Login,
    /// Upload an artifact, wait for review and release it
    Publish(PublishArgs),
    /// Release an already processed revision
    Release(ReleaseArgs),
}

/// Non-secret endpoint settings. The passphrase only comes from the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Store API base URL
    #[arg(long, global = true, env = "STOREPUB_DASHBOARD_URL")]
    pub dashboard_url: Option<String>,

    /// Identity service base URL
    #[arg(long, global = true, env = "STOREPUB_LOGIN_URL")]
    pub login_url: Option<String>,

    /// Upload server base URL
    #[arg(long, global = true, env = "STOREPUB_UPLOAD_URL")]
    pub upload_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "STOREPUB_TIMEOUT")]
    pub timeout_secs: Option<u64>,
}

impl EndpointArgs {
    pub fn to_config(&self) -> EndpointConfig {
        let mut config = EndpointConfig::default();
        if let Some(url) = &self.dashboard_url {
            config = config.with_dashboard_url(url);
        }
        if let Some(url) = &self.login_url {
            config = config.with_login_url(url);
        }
        if let Some(url) = &self.upload_url {
            config = config.with_upload_url(url);
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// Package name registered in the store
    #[arg(long)]
    pub name: String,

    /// Release series
    #[arg(long, default_value = "16")]
    pub series: String,

    /// Channel to release to (repeatable)
    #[arg(long = "channel", required = true)]
    pub channels: Vec<String>,

    /// Status polls before giving up
    #[arg(long, env = "STOREPUB_POLL_ATTEMPTS", default_value_t = 60,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub poll_attempts: u32,

    /// Seconds between status polls
    #[arg(long, env = "STOREPUB_POLL_INTERVAL_SECS", default_value_t = 5)]
    pub poll_interval_secs: u64,

    /// Artifact to upload
    pub artifact: PathBuf,
}

impl PublishArgs {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            self.poll_attempts,
            std::time::Duration::from_secs(self.poll_interval_secs),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReleaseArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "16")]
    pub series: String,

    /// Revision assigned by the store
    #[arg(long)]
    pub revision: Revision,

    /// Channel to release to (repeatable)
    #[arg(long = "channel", required = true)]
    pub channels: Vec<String>,
}
