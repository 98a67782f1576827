use colored::Colorize;

use super::{identifier_codec, load_config, resolve_input};
use crate::cli::Cli;
use crate::error::Result;

pub async fn run(cli: &Cli, video: &str, page: Option<u32>) -> Result<()> {
    let config = load_config(cli)?;
    let reference = resolve_input(&config, video, page).await?;
    let identifier = identifier_codec(&config).encode(&reference);
    let detail_url = format!("{}{}", config.registry.details_url, identifier);

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "bvid": reference.raw_id,
                "page": reference.page_index,
                "identifier": identifier,
                "detail_url": detail_url,
            })
        );
    } else {
        println!("{}", identifier);
        println!("  {} {}", "Details:".dimmed(), detail_url);
    }

    Ok(())
}
