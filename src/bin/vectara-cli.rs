use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "vectara-cli")]
#[command(about = "Diagnostics CLI for the Vectara MCP server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Bearer token for tool endpoints
    #[arg(short, long, env = "VECTARA_CLI_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness probe
    Live,
    /// Readiness probe (dependencies included)
    Ready,
    /// Detailed health report
    Detailed,
    /// Connection and retry statistics
    Stats,
    /// List available tools
    Tools,
    /// Call a tool with JSON arguments
    Call {
        name: String,
        #[arg(default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    let res = match cli.command {
        Commands::Live => client.get(format!("{}/health", base)).send().await?,
        Commands::Ready => client.get(format!("{}/ready", base)).send().await?,
        Commands::Detailed => client.get(format!("{}/health/detailed", base)).send().await?,
        Commands::Stats => client.get(format!("{}/stats", base)).send().await?,
        Commands::Tools => {
            client
                .get(format!("{}/tools", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Call { name, args } => {
            let args: Value = serde_json::from_str(&args)?;
            client
                .post(format!("{}/tools/{}", base, name))
                .headers(headers)
                .json(&args)
                .send()
                .await?
        }
    };

    if !print_response(res).await? {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the body; returns whether the status was a success.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }
    Ok(status.is_success())
}
