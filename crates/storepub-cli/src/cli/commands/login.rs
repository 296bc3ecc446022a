use std::path::PathBuf;

use storepub_core::{EndpointConfig, PublishResult, Session};

use super::{open, report};
use crate::exit_codes;
use crate::terminal::TerminalPrompt;

pub async fn run(endpoints: EndpointConfig) -> anyhow::Result<i32> {
    match login(endpoints).await {
        Ok(path) => {
            println!("Login successful. Credential saved to {}", path.display());
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

async fn login(endpoints: EndpointConfig) -> PublishResult<PathBuf> {
    let (client, store) = open(endpoints)?;
    Session::new(&client, &store)
        .login(&TerminalPrompt::default())
        .await?;
    Ok(store.path().to_path_buf())
}
