use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "resilience-cli")]
#[command(about = "Monitoring CLI for the credit scoring resilience service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overall system health
    Health,
    /// List every circuit breaker
    Breakers,
    /// Show one circuit breaker
    Breaker { name: String },
    /// Force a circuit breaker closed and clear its metrics
    Reset { name: String },
    /// Force a circuit breaker open
    Open { name: String },
    /// Scoring service health report
    Scoring,
    /// Scoring service performance metrics
    Metrics,
    /// Potential issues and recommended actions
    Diagnostics,
    /// Score a JSON feature map, e.g. '{"transaction_count": 12}'
    Score { features: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Health => client.get(format!("{base}/monitoring/health")),
        Commands::Breakers => client.get(format!("{base}/monitoring/circuit-breakers")),
        Commands::Breaker { name } => {
            client.get(format!("{base}/monitoring/circuit-breakers/{name}"))
        }
        Commands::Reset { name } => {
            client.post(format!("{base}/monitoring/circuit-breakers/{name}/reset"))
        }
        Commands::Open { name } => {
            client.post(format!("{base}/monitoring/circuit-breakers/{name}/open"))
        }
        Commands::Scoring => client.get(format!("{base}/monitoring/scoring/health")),
        Commands::Metrics => client.get(format!("{base}/monitoring/scoring/metrics")),
        Commands::Diagnostics => client.get(format!("{base}/monitoring/diagnostics")),
        Commands::Score { features } => {
            let body: Value = serde_json::from_str(&features)?;
            client.post(format!("{base}/score")).json(&body)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Monitoring API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
