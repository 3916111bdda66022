use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "obs-cli")]
#[command(about = "Inspect a running booking backend", long_about = None)]
struct Cli {
    #[arg(short, long, env = "OBS_URL", default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the liveness report
    Health,
    /// Dump the metrics exposition
    Metrics {
        /// Exposition path on the server
        #[arg(long, default_value = "/metrics")]
        path: String,

        /// Only show metrics whose name starts with this prefix
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            let res = check_status(res).await?;
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Metrics { path, filter } => {
            let res = client.get(format!("{}{}", base, path)).send().await?;
            let text = check_status(res).await?.text().await?;
            match filter {
                Some(prefix) => print!("{}", filter_exposition(&text, &prefix)),
                None => print!("{}", text),
            }
        }
    }

    Ok(())
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    Err(format!("server returned status {}: {}", status, text).into())
}

/// Keep exposition lines (samples and HELP/TYPE comments) for metric names
/// starting with `prefix`.
fn filter_exposition(text: &str, prefix: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let name = match line.strip_prefix("# ") {
            Some(comment) => comment.split_whitespace().nth(1).unwrap_or(""),
            None => line.split(['{', ' ']).next().unwrap_or(""),
        };
        if name.starts_with(prefix) {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
