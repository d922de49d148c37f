use anyhow::Context;
use mc_runner::{McRunner, StartOutcome};
use tracing_subscriber::{EnvFilter, fmt};

/// Usage: `cargo run --example supervise -- demos/config.example.json [server ...]`
///
/// Starts the named servers as an administrator, prints the listing, then
/// keeps supervising until SIGINT/SIGTERM and stops everything cleanly.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG=mc_runner=debug` also shows the servers' console output
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().context("missing config path argument")?;
    let runner = McRunner::from_config_file(&config_path)
        .with_context(|| format!("loading {}", config_path))?;

    for name in args {
        match runner.start(&name, true).await {
            StartOutcome::Started => println!("started {}", name),
            StartOutcome::Failed => println!("{} failed to start", name),
            StartOutcome::Rejected(reason) => println!("cannot start {}: {}", name, reason),
        }
    }

    for (server, status) in runner.list_with_status().await {
        let players = match status {
            Some(report) => match (report.online, report.max) {
                (Some(online), Some(max)) => format!(", {}/{} players", online, max),
                _ => String::new(),
            },
            None => String::new(),
        };
        let visibility = if server.public { "public" } else { "restricted" };
        println!(
            "{} [{}] {} port {}{}",
            server.name, visibility, server.state, server.port, players
        );
    }

    wait_for_signal().await?;
    tracing::info!("Received termination signal, gracefully stopping");
    runner.shutdown().await;
    println!("Everything shut down, exiting.");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("waiting for SIGINT")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")
}
