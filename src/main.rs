use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

use paypal_sandbox_tester::config::TesterConfig;
use paypal_sandbox_tester::email::{LogMailer, Mailer, SmtpMailer};
use paypal_sandbox_tester::ipn::ReqwestIpnTransport;
use paypal_sandbox_tester::paypal_handler::SandboxTestState;
use paypal_sandbox_tester::store::store_from_url;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if available
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = TesterConfig::from_env()?;

    let kv = store_from_url(config.redis_url.as_deref());
    let transport = Arc::new(ReqwestIpnTransport::new(config.ipn_verify_url.clone())?);
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)),
        None => Arc::new(LogMailer),
    };

    let port = config.port;
    let state = Arc::new(SandboxTestState::new(config, kv, transport, mailer));
    let app = paypal_sandbox_tester::app(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!("   - Sandbox Test:   http://{}/paypal/sandbox-test", addr);
    tracing::info!("   - IPN Listener:   http://{}/paypal/ipn", addr);
    tracing::info!("   - Health Check:   http://{}/health", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("SIGTERM received, shutting down gracefully");
}
