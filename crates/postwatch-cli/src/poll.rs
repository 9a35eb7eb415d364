//! `poll` command: run poll rounds over a set of accounts until stopped.
//!
//! The first round only establishes each account's baseline. Every later
//! round prints the new posts of all accounts to stdout, one JSON object per
//! line. A failed poll is logged and the account is tried again next round.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use postwatch_core::{AppConfig, CanonicalPost, Target};
use postwatch_weibo::{Category, WeiboPipeline};
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
pub(crate) struct PollOptions {
    pub(crate) rounds: Option<u32>,
    pub(crate) interval_secs: u64,
    pub(crate) categories: Vec<Category>,
}

pub(crate) async fn run_poll(
    config: &AppConfig,
    targets: &[Target],
    options: &PollOptions,
) -> anyhow::Result<()> {
    let pipeline = WeiboPipeline::from_config(config).context("failed to build weibo pipeline")?;

    let mut ticker = tokio::time::interval(Duration::from_secs(options.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        targets = targets.len(),
        interval_secs = options.interval_secs,
        rounds = ?options.rounds,
        "starting poll loop"
    );

    let mut round: u32 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                tracing::info!(round, "received ctrl-c, stopping poll loop");
                break;
            }
        }

        round += 1;
        let results = join_all(
            targets
                .iter()
                .map(|target| pipeline.run_cycle(target, &options.categories)),
        )
        .await;

        let mut delivered = 0usize;
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(posts) => {
                    delivered += posts.len();
                    print_posts(&posts).context("failed to write posts to stdout")?;
                }
                Err(e) => {
                    tracing::warn!(uid = %target, round, error = %e, "poll failed, retrying next round");
                }
            }
        }
        tracing::debug!(round, delivered, "round finished");

        if options.rounds.is_some_and(|limit| round >= limit) {
            break;
        }
    }

    Ok(())
}

fn print_posts(posts: &[CanonicalPost]) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    for post in posts {
        serde_json::to_writer(&mut out, post)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
