use alloy_provider::Provider;
use checkpoint::FileCheckpointStore;
use clap::Parser;
use client::RpcChainReader;
use config::MintParams;
use deposit::TokensLockedDecoder;
use mint::MintBuilder;
use relayer::{config::Config, metrics::install_prometheus_exporter, CycleOutcome, RelayEngine};
use scanner::safe_head;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relayer")]
#[command(about = "Relay confirmed source chain deposits as signed destination mints")]
struct Cli {
    /// Path to the configuration file. Environment variables override it;
    /// a missing file means environment only.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Private key for signing mint transactions (hex string, with or without 0x prefix)
    #[arg(short = 'k', long, env = "LISTENER_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("Starting relayer");
    info!("Loading config: {}", cli.config.display());
    let config = Config::load(&cli.config)?;

    info!("Loaded config:");
    info!("  Source RPC URL: {}", config.source_rpc_url);
    info!("  Destination RPC URL: {}", config.destination_rpc_url);
    info!("  Source bridge: {}", config.source_bridge_address);
    info!("  Destination bridge: {}", config.destination_bridge_address);
    info!("  Source token: {}", config.source_token_address);
    info!("  State file: {}", config.state_file.display());
    info!(
        "  Confirmations: {}, batch size: {}, poll interval: {}s",
        config.relay.block_confirmations_required,
        config.relay.scan_batch_size,
        config.relay.poll_interval_secs
    );

    let signer = client::parse_signer(&cli.private_key)?;
    info!("  Relayer account: {}", signer.address());

    if let Some(port) = config.metrics_port {
        install_prometheus_exporter(port)?;
        info!("  Metrics: 0.0.0.0:{}", port);
    }

    let source = client::create_provider(&config.source_rpc_url).await?;
    let destination = client::create_provider(&config.destination_rpc_url).await?;

    let start_block = resolve_start_block(&config, &source).await?;
    let store = FileCheckpointStore::new(&config.state_file, start_block);

    let mint_params = resolve_mint_params(&config, &destination).await?;
    mint_params.validate()?;
    let builder = MintBuilder::new(signer, config.destination_bridge_address, mint_params);
    let initial_nonce = destination.get_transaction_count(builder.address()).await?;
    info!(
        chain_id = mint_params.chain_id,
        gas_limit = mint_params.gas_limit,
        max_fee_per_gas = mint_params.max_fee_per_gas,
        max_priority_fee_per_gas = mint_params.max_priority_fee_per_gas,
        initial_nonce,
        "Mint parameters"
    );

    let mut engine = RelayEngine::new(
        RpcChainReader::new(source),
        TokensLockedDecoder::new(config.source_bridge_address, config.source_token_address),
        builder,
        store,
        config.relay.clone(),
        initial_nonce,
    )?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    if cli.once {
        match engine.run_once(&cancel).await? {
            None => {}
            Some(CycleOutcome::Idle { chain_head }) => info!(chain_head, "Nothing to relay"),
            Some(CycleOutcome::Committed(report)) => info!(
                window = %report.window,
                built = report.built.len(),
                skipped = report.skipped,
                integrity_failures = report.integrity_failures.len(),
                "Cycle complete"
            ),
        }
        return Ok(());
    }

    engine.run(cancel).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Configured start block, or the current safe head when nothing is
/// configured and no checkpoint exists yet.
async fn resolve_start_block<P: Provider>(config: &Config, provider: &P) -> eyre::Result<u64> {
    if let Some(block) = config.start_block {
        return Ok(block);
    }

    let store = FileCheckpointStore::new(&config.state_file, 1);
    if store.exists().await? {
        // The checkpoint decides where scanning resumes.
        return Ok(1);
    }

    let head = provider.get_block_number().await?;
    let start = safe_head(head, config.relay.block_confirmations_required)
        .saturating_add(1)
        .max(1);
    info!(head, start, "No checkpoint and no start block, starting at safe head");
    Ok(start)
}

async fn resolve_mint_params<P: Provider>(config: &Config, provider: &P) -> eyre::Result<MintParams> {
    if let Some(params) = config.mint_params() {
        return Ok(params);
    }

    let chain_id = match config.destination_chain_id {
        Some(id) => id,
        None => provider.get_chain_id().await?,
    };

    let (max_fee, priority_fee) = match (config.max_fee_per_gas, config.max_priority_fee_per_gas) {
        (Some(max_fee), Some(priority_fee)) => (max_fee, priority_fee),
        (max_fee, priority_fee) => {
            let estimate = provider.estimate_eip1559_fees().await?;
            warn!(
                max_fee_per_gas = estimate.max_fee_per_gas,
                max_priority_fee_per_gas = estimate.max_priority_fee_per_gas,
                "Using destination fee estimate fixed for this run"
            );
            (
                max_fee.unwrap_or(estimate.max_fee_per_gas),
                priority_fee.unwrap_or(estimate.max_priority_fee_per_gas),
            )
        }
    };

    Ok(MintParams::new(chain_id, max_fee, priority_fee).with_gas_limit(config.gas_limit))
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                wait_for_ctrl_c().await;
                cancel.cancel();
                return;
            }
        };

        tokio::select! {
            _ = wait_for_ctrl_c() => {}
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;

    info!("Shutting down");
    cancel.cancel();
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
