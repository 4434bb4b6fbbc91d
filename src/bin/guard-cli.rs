use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Exercise a running upstream-guard service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show circuit breaker statistics
    Status,
    /// Call the upstream through the circuit breaker
    Fire {
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Call the upstream directly, without the circuit breaker
    Direct {
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/circuit-breaker-status/custom", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Fire { count } => {
            for i in 1..=count {
                let res = client
                    .get(format!("{}/with-circuit-breaker", cli.url))
                    .send()
                    .await?;
                print!("#{} ", i);
                print_response(res).await?;
            }
        }
        Commands::Direct { count } => {
            for i in 1..=count {
                let res = client
                    .get(format!("{}/no-circuit-breaker", cli.url))
                    .send()
                    .await?;
                print!("#{} ", i);
                print_response(res).await?;
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let json: Value = res.json().await?;
    if status.is_success() {
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        eprintln!("Error: service returned status {}", status);
        eprintln!("Response: {}", json);
    }
    Ok(())
}
