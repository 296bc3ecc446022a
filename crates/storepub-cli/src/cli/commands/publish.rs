use std::io::Write;

use storepub_core::{
    EndpointConfig, PublishOutcome, PublishRequest, PublishResult, Publisher, Session,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{open, render_channel_map, report};
use crate::cli::args::PublishArgs;
use crate::exit_codes;
use crate::terminal::TerminalPrompt;

pub async fn run(args: PublishArgs, endpoints: EndpointConfig) -> anyhow::Result<i32> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, stopping before the next step (Ctrl-C again to abort now)");
        on_interrupt.cancel();

        // A step that does not observe cancellation can still be cut short.
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("aborted");
            std::process::exit(exit_codes::FAILURE);
        }
    });

    let outcome = match publish(&args, endpoints, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => return Ok(report(&e)),
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "Revision {} of {} released to {}",
        outcome.revision,
        args.name,
        args.channels.join(", ")
    )?;
    if !outcome.opened_channels.is_empty() {
        writeln!(stdout, "Opened channels: {}", outcome.opened_channels.join(", "))?;
    }
    write!(stdout, "{}", render_channel_map(&outcome.channel_map))?;
    Ok(exit_codes::SUCCESS)
}

async fn publish(
    args: &PublishArgs,
    endpoints: EndpointConfig,
    cancel: &CancellationToken,
) -> PublishResult<PublishOutcome> {
    let (client, store) = open(endpoints)?;
    let credential = Session::new(&client, &store)
        .credential(&TerminalPrompt::default())
        .await?;

    let request = PublishRequest {
        name: args.name.clone(),
        series: args.series.clone(),
        channels: args.channels.clone(),
        artifact: args.artifact.clone(),
    };
    Publisher::new(&client, args.poll_config())
        .publish(&request, &credential, cancel)
        .await
}
