//! `imgrab agent` – feed stdin messages to the download agent.

use anyhow::Result;
use imgrab_core::agent::Agent;
use imgrab_core::config::ImgrabConfig;
use imgrab_core::message::{self, Message, RequestSender};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub async fn run_agent(cfg: &ImgrabConfig, download_dir: &Path) -> Result<()> {
    let agent = Agent::from_config(cfg, download_dir);
    tracing::info!(
        dir = %download_dir.display(),
        endpoint = %agent.pipeline().convert_endpoint(),
        "agent ready, reading messages from stdin"
    );

    let (tx, rx) = message::channel();
    let reader = tokio::spawn(forward_lines(BufReader::new(tokio::io::stdin()), tx));

    let processed = agent.run(rx).await;
    reader.await??;
    println!("Processed {} download request(s).", processed);
    Ok(())
}

/// Parses one message per line and forwards it. Blank and unparseable lines
/// are skipped; the sender is dropped at end of input.
async fn forward_lines<R>(input: R, tx: RequestSender) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut forwarded = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Message::from_json(line) {
            Ok(Message::DownloadImage(request)) => {
                tx.send(request);
                forwarded += 1;
            }
            Err(e) => tracing::warn!("ignoring unparseable message: {}", e),
        }
    }
    tracing::debug!(forwarded, "end of input");
    Ok(forwarded)
}
