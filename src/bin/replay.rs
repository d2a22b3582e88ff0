//! Replays TNC2 lines from stdin through the router with a logging transport.
//! Handy for checking a config against a captured feed:
//!
//! `beacon-replay < capture.txt`

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use beacon_watch::config::AppConfig;
use beacon_watch::ingest::packet::parse_tnc2;
use beacon_watch::license::CallookClient;
use beacon_watch::notify::LogNotifier;
use beacon_watch::Verdict;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load_default()?;
    let lookup = Arc::new(CallookClient::from_env()?);
    let router = beacon_watch::build_router(&config, lookup, Arc::new(LogNotifier));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut seen, mut sent) = (0usize, 0usize);
    while let Some(line) = lines.next_line().await? {
        let Some(report) = parse_tnc2(&line) else {
            continue;
        };
        seen += 1;
        let outcomes = router.process(report).await;
        sent += outcomes
            .iter()
            .filter(|o| o.verdict == Verdict::Sent)
            .count();
    }

    println!("replay done: {seen} reports, {sent} alerts");
    Ok(())
}
