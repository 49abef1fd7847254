use a3s_gate::lifecycle::{shutdown_signal, Gate};
use a3s_gate::config::load_dotenv;
use a3s_gate::GateConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();

    let config = match GateConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let gate = Gate::connect(&config).await;

    let shutdown = async {
        let reason = shutdown_signal().await;
        tracing::info!(%reason, "Shutdown requested");
    };

    if let Err(e) = gate.run_until(shutdown).await {
        tracing::error!("Startup failed: {}", e);
        std::process::exit(1);
    }

    // Exit without dropping the runtime: background captures are abandoned,
    // not cancelled against already-released hardware.
    std::process::exit(0);
}
