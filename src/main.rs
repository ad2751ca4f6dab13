#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use clap::Parser;
use email_alert::{RunOptions, Result};

#[derive(Parser, Debug)]
#[command(name = "email-alert")]
#[command(author, version, about = "Notification and push alert monitor", long_about = None)]
struct Args {
    #[arg(short, long, help = "Directory containing settings.json", default_value = ".")]
    config_dir: PathBuf,

    #[arg(long, help = "Override the state store directory")]
    data_dir: Option<PathBuf>,

    #[arg(long, help = "Alert server base URL for the event feed")]
    feed_url: Option<String>,

    #[arg(long, help = "Fire a test alert at startup")]
    test_alert: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    log::info!("Starting email-alert v{}", env!("CARGO_PKG_VERSION"));

    email_alert::run(RunOptions {
        config_dir: args.config_dir,
        data_dir: args.data_dir,
        feed_url: args.feed_url,
        test_alert: args.test_alert,
    })
    .await
}
