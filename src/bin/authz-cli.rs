use clap::Parser;

use ext_authz::client::{self, CheckInput};
use ext_authz::protocol::ProtocolVersion;

#[derive(Parser)]
#[command(name = "authz-cli")]
#[command(about = "Send a single check call to a running ext-authz service", long_about = None)]
struct Cli {
    /// Service address
    #[arg(short, long, default_value = "http://localhost:3000")]
    target: String,

    /// Protocol version to speak (v3, v2, v2alpha, http)
    #[arg(short = 'p', long = "protocol", default_value = "v3")]
    version: ProtocolVersion,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request target, query included
    #[arg(default_value = "/")]
    path: String,

    #[arg(long, default_value = "localhost")]
    host: String,

    /// Request header as `name: value`, repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    #[arg(short, long)]
    body: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `name: value`, got {raw:?}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let input = CheckInput {
        method: cli.method,
        path: cli.path,
        host: cli.host,
        headers: cli.headers,
        body: cli.body,
    };
    let outcome = client::check(cli.version, &cli.target, &input).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let verdict = if outcome.is_allowed() { "ALLOW" } else { "DENY" };
    println!("{verdict} ({:?}, http {})", outcome.code, outcome.http_status);
    for header in &outcome.headers {
        match header.append {
            Some(true) => println!("  + {}: {}", header.key, header.value),
            Some(false) => println!("  = {}: {}", header.key, header.value),
            None => println!("    {}: {}", header.key, header.value),
        }
    }
    if !outcome.body.is_empty() {
        println!();
        println!("{}", outcome.body);
    }
    Ok(())
}
