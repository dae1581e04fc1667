use anyhow::{bail, Context};
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;
use whois_client::{Config, WhoisClient, WhoisError};

const USAGE: &str = "usage: whois [--json] [--split] [--host <server>] <domain>...";

#[derive(Debug, Default)]
struct Args {
    json: bool,
    split_only: bool,
    host: Option<String>,
    domains: Vec<String>,
}

impl Args {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => parsed.json = true,
                "--split" => parsed.split_only = true,
                "--host" => {
                    parsed.host = Some(args.next().context("--host needs a server name")?);
                }
                "-h" | "--help" => bail!(USAGE),
                flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
                _ => parsed.domains.push(arg),
            }
        }
        if parsed.domains.is_empty() {
            bail!(USAGE);
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "whois_client=info".into()),
        )
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");
    let client = WhoisClient::new_with_config(config).await?;

    let lookups = args.domains.iter().map(|domain| run(&client, &args, domain));
    let mut failed = 0;
    for (domain, outcome) in args.domains.iter().zip(join_all(lookups).await) {
        match outcome {
            Ok(output) => println!("{}", output),
            Err(e) => {
                failed += 1;
                eprintln!("{}: [{}] {}", domain, e.kind(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} lookups failed", failed, args.domains.len());
    }
    Ok(())
}

async fn run(client: &WhoisClient, args: &Args, domain: &str) -> Result<String, WhoisError> {
    if let Some(host) = &args.host {
        return client.lookup_host(domain, host).await;
    }

    if args.split_only {
        let split = client.split(domain)?;
        return Ok(if args.json {
            to_json(&split)?
        } else {
            format!("{}\t{}\t{}", split.name, split.suffix, split.server)
        });
    }

    let response = client.lookup(domain).await?;
    if args.json {
        to_json(&response)
    } else {
        Ok(response.raw)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, WhoisError> {
    serde_json::to_string_pretty(value).map_err(|e| WhoisError::Internal(e.to_string()))
}
