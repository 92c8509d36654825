//! reward_stats - learning-curve summary of the episode reward log

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use target_launcher::rl::{RewardLog, RewardSummary};
use target_launcher::LauncherConfig;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Reward log to read. Defaults to `rl.reward_log_path` from the config.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Configuration file (TOML). Falls back to $LAUNCHER_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let path = match args.log {
        Some(path) => path,
        None => LauncherConfig::load(args.config.as_deref())?.rl.reward_log_path,
    };

    let totals = RewardLog::new(&path).read()?;
    match RewardSummary::from_totals(&totals) {
        Some(summary) => println!("{summary}"),
        None => println!("{} holds no episodes yet", path.display()),
    }
    Ok(())
}
