//! `account` command: resolve a user id to its display name.

use anyhow::Context;
use postwatch_core::{AppConfig, Target};
use postwatch_weibo::WeiboClient;

pub(crate) async fn run_account(config: &AppConfig, target: &Target) -> anyhow::Result<()> {
    let client = WeiboClient::from_config(config).context("failed to build weibo client")?;
    let name = client
        .account_name(target)
        .await
        .with_context(|| format!("failed to look up account {target}"))?;

    match name {
        Some(name) => {
            println!("{name}");
            Ok(())
        }
        None => anyhow::bail!("no weibo account found for {target}"),
    }
}
