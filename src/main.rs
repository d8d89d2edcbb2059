use std::process;

use anyhow::Result;
use chrono::Local;

pub mod config;
pub mod crawler;
pub mod logging;
pub mod util;

use crate::config::Config;

const SEPARATOR: &str = "============================================================";

#[tokio::main]
async fn main() {
    logging::info(SEPARATOR.to_string());
    logging::info("DAILY SENTIMENT ANALYSIS CRON JOB STARTED".to_string());
    logging::info(format!("Current time: {}", Local::now().to_rfc3339()));
    logging::info(SEPARATOR.to_string());

    // 結果只在這裡轉成退出碼
    let exit_code = match run().await {
        Ok(()) => {
            logging::info("Sentiment analysis cron job completed successfully".to_string());
            0
        }
        Err(why) => {
            logging::error(format!("Sentiment analysis cron job failed: {:?}", why));
            1
        }
    };

    logging::info(SEPARATOR.to_string());
    logging::flush();
    process::exit(exit_code);
}

/// Drives one run end to end: load the configuration, trigger the remote
/// sentiment fetch, report the outcome. Any fault at any stage surfaces
/// here as an `Err` and turns into exit status 1.
async fn run() -> Result<()> {
    let config = Config::load()?;
    logging::info(format!(
        "Configuration loaded - Base URL: {}",
        config.base_url
    ));

    crawler::sentiment::visit(&config).await?;

    Ok(())
}
