use std::fmt::Write as _;

use storepub_core::{
    ChannelMap, CredentialStore, EndpointConfig, PublishError, PublishResult, StoreClient,
    StoreConfig,
};

pub mod login;
pub mod publish;
pub mod release;

use super::args::{Cli, Command};
use crate::exit_codes;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let endpoints = cli.endpoints.to_config();
    match cli.cmd {
        Command::Login => login::run(endpoints).await,
        Command::Publish(args) => publish::run(args, endpoints).await,
        Command::Release(args) => release::run(args, endpoints).await,
    }
}

/// Client and credential store for one invocation. The passphrase is
/// checked before anything touches the network.
pub(crate) fn open(endpoints: EndpointConfig) -> PublishResult<(StoreClient, CredentialStore)> {
    let store = CredentialStore::new(StoreConfig::from_env()?);
    let client = StoreClient::new(endpoints)?;
    Ok((client, store))
}

/// Print a handled failure. Every `PublishError` is a handled failure.
pub(crate) fn report(e: &PublishError) -> i32 {
    eprintln!("error: {e}");
    exit_codes::FAILURE
}

/// One `channel  revision|tracking|-` line per entry, channel column aligned.
pub(crate) fn render_channel_map(map: &ChannelMap) -> String {
    let width = map.iter().map(|e| e.channel.len()).max().unwrap_or(0);
    let mut out = String::new();
    for entry in map {
        let state = match entry.revision {
            Some(revision) => revision.to_string(),
            None if entry.is_tracking() => "tracking".to_string(),
            None => "-".to_string(),
        };
        let _ = writeln!(out, "{:<width$}  {}", entry.channel, state, width = width);
    }
    out
}
