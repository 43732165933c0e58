use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use dialscope::common::{CliArgs, HarnessConfig, ProviderKind};
use dialscope::{Progress, run_harness_reporting};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = CliArgs::parse();

    // Logs go to stderr so stdout only carries the exchange
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("dialscope={}", args.log_level)))
        .wrap_err("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = HarnessConfig::from(args);
    let label = match config.provider {
        ProviderKind::Tcp => "tcp",
        ProviderKind::Module => "transport module",
    };
    info!(
        provider = label,
        cancel_dial_scope = config.cancel_dial_scope,
        "Starting connection lifetime check"
    );

    let scope = CancellationToken::new();
    let _scope_guard = scope.clone().drop_guard();

    // Steps reach stdout as they happen
    let (progress, mut events) = mpsc::unbounded_channel::<Progress>();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{event}");
        }
    });

    let result = run_harness_reporting(config, scope, Some(progress)).await;
    printer.await.wrap_err("Progress printer failed")?;
    result.wrap_err_with(|| format!("{label} connection lifetime check failed"))?;

    Ok(())
}
