use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Manage the proxy directory of a signing gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Session token of an admin or operator.
    #[arg(short, long, env = "GATEWAY_SESSION")]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the default proxy
    Default,
    /// List every node → proxy mapping
    List,
    /// Show the proxy of one node
    Get { node: String },
    /// Map a node to a proxy
    Add { node: String, proxy: String },
    /// Change a node's proxy, optionally renaming the node
    Update {
        node: String,
        proxy: String,
        #[arg(long)]
        new_node: Option<String>,
    },
    /// Remove a node's mapping
    Remove { node: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = Url::parse(&cli.url)?;

    let mut headers = HeaderMap::new();
    if let Some(session) = &cli.session {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {session}"))?,
        );
    }

    let request = match cli.command {
        Commands::Default => client.get(endpoint(&base, &["config", "proxy"])?),
        Commands::List => client.get(endpoint(&base, &["proxies"])?),
        Commands::Get { node } => client.get(endpoint(&base, &["proxies", &node])?),
        Commands::Add { node, proxy } => client
            .post(endpoint(&base, &["proxies"])?)
            .json(&json!({ "NodeAddr": node, "Proxy": proxy })),
        Commands::Update {
            node,
            proxy,
            new_node,
        } => {
            let new_node = new_node.unwrap_or_else(|| node.clone());
            client
                .put(endpoint(&base, &["proxies", &node])?)
                .json(&json!({ "Proxy": proxy, "NewNode": new_node }))
        }
        Commands::Remove { node } => client.delete(endpoint(&base, &["proxies", &node])?),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

/// `{base}/api/{segments...}`, each segment percent-encoded.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| "gateway URL cannot be a base")?
        .pop_if_empty()
        .push("api")
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
