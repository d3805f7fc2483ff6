//! Failover CLI Tool
//!
//! Command line interface for validating routing configuration and probing services

use anyhow::Result;
use clap::{Parser, Subcommand};
use failover_balance::RoutingState;
use failover_core::config::loader::load_config_from_path;
use failover_core::RouteRequest;
use failover_relay::RouterManager;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "failover-cli")]
#[command(about = "A CLI tool for the client-side failover router")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "failover.toml")]
        config: String,
    },
    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "failover_example.toml")]
        output: String,
    },
    /// Route requests to a service and report which node served them
    Probe {
        /// Path to configuration file
        #[arg(short, long, default_value = "failover.toml")]
        config: String,
        /// Service name to probe
        #[arg(short, long)]
        service: String,
        /// Request path relative to each node's base URL
        #[arg(short, long, default_value = "/")]
        path: String,
        /// Number of calls to make
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration file: {}", config);
            match load_config_from_path(&config) {
                Ok(cfg) => {
                    println!("✅ Configuration is valid");
                    println!("  - {} services configured", cfg.services.len());
                    let mut names: Vec<_> = cfg.services.keys().collect();
                    names.sort();
                    for name in names {
                        if let Some(service) = cfg.get_service(name) {
                            println!(
                                "  - {}: {} uris, {}",
                                name,
                                service.uris.len(),
                                service.node_selection_strategy
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Configuration validation failed: {}", e);
                    eprintln!("❌ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::GenerateConfig { output } => {
            println!("Generating configuration file: {}", output);
            generate_config_file(&output)?;
            println!("✅ Configuration file generated successfully");
        }
        Commands::Probe {
            config,
            service,
            path,
            count,
            json,
        } => {
            let cfg = load_config_from_path(&config)?;
            probe_service(cfg, &service, &path, count, json).await?;
        }
    }

    Ok(())
}

/// 生成配置文件
fn generate_config_file(output_path: &str) -> Result<()> {
    let config_content = r#"# Failover Client Configuration File

[settings]
connect_timeout_ms = 10000
read_timeout_ms = 300000
user_agent = "failover-client"

# Leader-elected service: stay on one node until it fails
[services.timelock]
uris = [
    "https://timelock-1.example.com:8443/api",
    "https://timelock-2.example.com:8443/api",
    "https://timelock-3.example.com:8443/api",
]
node_selection_strategy = "PIN_UNTIL_ERROR"
max_num_retries = 4
failures_before_switching = 3
num_servers_to_try_before_failing = 14
max_num_relocations = 20
fast_failover_timeout_ms = 10000
max_backoff_ms = 3000

# Stateless service: spread calls and skip recently failed nodes
[services.catalog]
uris = [
    "http://catalog-1.example.com:9000",
    "http://catalog-2.example.com:9000",
]
node_selection_strategy = "ROUND_ROBIN"
failed_url_cooldown_ms = 5000
randomize_order = true
connect_timeout_ms = 2000
read_timeout_ms = 30000
"#;

    std::fs::write(output_path, config_content)?;
    Ok(())
}

/// 通过路由发送探测请求
async fn probe_service(
    config: failover_core::Config,
    service_name: &str,
    path: &str,
    count: u32,
    json: bool,
) -> Result<()> {
    let manager = RouterManager::new(config)?;
    let router = manager.router(service_name)?;

    if !json {
        println!("🔍 Probing service '{}' ({})", service_name, router.nodes());
        println!("Strategy: {}", router.config().strategy);
        println!();
    }

    let request = RouteRequest::get(path);
    let mut results = Vec::new();
    let mut failures = 0u32;

    for call in 1..=count {
        let started = Instant::now();
        let outcome = router.route(&request).await;
        let elapsed_ms = started.elapsed().as_millis();

        match outcome {
            Ok(response) => {
                if !json {
                    println!(
                        "✅ Call {}: {} -> {} ({}ms)",
                        call, response.status, response.url, elapsed_ms
                    );
                }
                results.push(serde_json::json!({
                    "call": call,
                    "ok": true,
                    "status": response.status,
                    "url": response.url,
                    "elapsed_ms": elapsed_ms,
                }));
            }
            Err(e) => {
                failures += 1;
                tracing::error!("Call {} to service '{}' failed: {}", call, service_name, e);
                if !json {
                    println!("❌ Call {}: {} ({}ms)", call, e, elapsed_ms);
                }
                results.push(serde_json::json!({
                    "call": call,
                    "ok": false,
                    "error": e.to_string(),
                    "elapsed_ms": elapsed_ms,
                }));
            }
        }
    }

    let state = router.snapshot();
    let cooldown = router.cooldown_stats();

    if json {
        let report = serde_json::json!({
            "service": service_name,
            "strategy": router.config().strategy.to_string(),
            "nodes": router.nodes().as_slice(),
            "calls": results,
            "failures": failures,
            "state": state_json(&state, router.nodes().get(state.current_index)),
            "cooling_nodes": cooldown.cooling_nodes,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("📊 Routing State");
        println!("================");
        println!("Pinned Node: {}", router.nodes().get(state.current_index));
        println!("Consecutive Failures: {}", state.consecutive_failures);
        println!("Switches Since Success: {}", state.switch_count);
        println!(
            "Fast Failover: {}",
            if state.fast_failover_start.is_some() { "active" } else { "inactive" }
        );
        println!("{}", cooldown);
        println!("Failed Calls: {}/{}", failures, count);
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn state_json(state: &RoutingState, pinned: &str) -> serde_json::Value {
    serde_json::json!({
        "current_index": state.current_index,
        "pinned_node": pinned,
        "consecutive_failures": state.consecutive_failures,
        "switch_count": state.switch_count,
        "fast_failover_active": state.fast_failover_start.is_some(),
        "last_selected": state.last_selected,
    })
}
