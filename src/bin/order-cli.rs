use clap::{Parser, Subcommand};
use serde_json::Value;

use order_service::orders::NewOrder;

#[derive(Parser)]
#[command(name = "order-cli")]
#[command(about = "Command-line client for the order service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an order
    Create {
        #[arg(long)]
        user_id: u64,
        #[arg(long)]
        product: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        price: f64,
    },
    /// Show one order
    Get { id: u64 },
    /// List all orders
    List,
    /// Look up a user through the service's resilient client
    User { user_id: u64 },
    /// Show the user-service circuit breaker
    Breaker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Create {
            user_id,
            product,
            quantity,
            price,
        } => {
            let order = NewOrder {
                user_id,
                product,
                quantity,
                price,
            };
            client
                .post(format!("{base}/api/orders"))
                .json(&order)
                .send()
                .await?
        }
        Commands::Get { id } => client.get(format!("{base}/api/orders/{id}")).send().await?,
        Commands::List => client.get(format!("{base}/api/orders")).send().await?,
        Commands::User { user_id } => {
            client
                .get(format!("{base}/api/orders/user/{user_id}"))
                .send()
                .await?
        }
        Commands::Breaker => {
            client
                .get(format!("{base}/api/orders/circuit-breaker/status"))
                .send()
                .await?
        }
    };

    print_response(res).await
}

/// Degraded answers (503) still carry a JSON body worth showing.
async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Service returned status {}", status);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }
    Ok(())
}
