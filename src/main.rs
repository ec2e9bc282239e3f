// src/main.rs

//! A small command-line client: invokes the given procedures concurrently on
//! one connection and prints every result once all of them have arrived.

use anyhow::Result;
use std::env;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;
use voltwire::{ClientConfig, Connection};

const DEFAULT_CONFIG_PATH: &str = "client.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.contains(&"--version".to_string()) {
        println!("{}", voltwire::build_info());
        return Ok(());
    }

    let mut config_path: Option<String> = None;
    let mut host: Option<String> = None;
    let mut port: Option<u16> = None;
    let mut adhoc: Vec<String> = Vec::new();
    let mut procedures: Vec<String> = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "--host" | "--port" | "--adhoc" => {
                let Some(value) = iter.next() else {
                    eprintln!("{arg} flag requires a value");
                    std::process::exit(1);
                };
                match arg.as_str() {
                    "--config" => config_path = Some(value),
                    "--host" => host = Some(value),
                    "--adhoc" => adhoc.push(value),
                    _ => match value.parse::<u16>() {
                        Ok(p) => port = Some(p),
                        Err(_) => {
                            eprintln!("Invalid port number: {value}");
                            std::process::exit(1);
                        }
                    },
                }
            }
            _ => procedures.push(arg),
        }
    }

    // An explicit --config must load; the default path is optional.
    let mut config = match config_path {
        Some(path) => match ClientConfig::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e}");
                std::process::exit(1);
            }
        },
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            ClientConfig::from_file(DEFAULT_CONFIG_PATH)?
        }
        None => ClientConfig::default(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = run(config, procedures, adhoc).await {
        error!("Client error: {}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(config: ClientConfig, procedures: Vec<String>, adhoc: Vec<String>) -> Result<()> {
    let conn = Connection::new(config);
    info!("Starting {}", voltwire::build_info());
    let info = conn.open().await?;
    info!(
        "Connected to node {} (session {}, build {})",
        info.server_node_id, info.session_id, info.build_tag
    );

    for name in &procedures {
        conn.prepare(name)?.query(Vec::new()).await?;
    }
    for sql in &adhoc {
        conn.prepare_adhoc(sql)?.query(Vec::new()).await?;
    }

    for query in conn.drain_all().await {
        match query.outcome() {
            Some(Ok(rows)) => println!(
                "handle {}: {} table(s), round trip {} ms",
                query.handle(),
                rows.tables.len(),
                rows.round_trip_ms
            ),
            Some(Err(e)) => println!("handle {}: error: {e}", query.handle()),
            None => println!("handle {}: unresolved", query.handle()),
        }
    }

    conn.close().await?;
    Ok(())
}
