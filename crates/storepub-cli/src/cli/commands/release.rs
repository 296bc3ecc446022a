use std::io::Write;

use storepub_core::{ChannelMap, EndpointConfig, PollConfig, PublishResult, Publisher, Session};

use super::{open, render_channel_map, report};
use crate::cli::args::ReleaseArgs;
use crate::exit_codes;
use crate::terminal::TerminalPrompt;

pub async fn run(args: ReleaseArgs, endpoints: EndpointConfig) -> anyhow::Result<i32> {
    let channel_map = match release(&args, endpoints).await {
        Ok(map) => map,
        Err(e) => return Ok(report(&e)),
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "Revision {} of {} released to {}",
        args.revision,
        args.name,
        args.channels.join(", ")
    )?;
    write!(stdout, "{}", render_channel_map(&channel_map))?;
    Ok(exit_codes::SUCCESS)
}

async fn release(args: &ReleaseArgs, endpoints: EndpointConfig) -> PublishResult<ChannelMap> {
    let (client, store) = open(endpoints)?;
    let credential = Session::new(&client, &store)
        .credential(&TerminalPrompt::default())
        .await?;

    // release never polls
    Publisher::new(&client, PollConfig::default())
        .release(
            args.revision,
            &credential,
            &args.name,
            &args.series,
            &args.channels,
        )
        .await
}
