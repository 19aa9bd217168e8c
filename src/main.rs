//! The main server entrypoint for the API.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// A `.env` file is optional; the environment always wins.
	dotenvy::dotenv().ok();

	let _log_guard = init_tracing();

	let config = warden_api::Config::new().context("load configuration")?;
	let addr = config.socket_addr();

	let state = warden_api::State::new(config)
		.await
		.context("initialize application state")?;

	let listener = TcpListener::bind(addr).await.context("bind tcp listener")?;

	tracing::info!("listening on {}", listener.local_addr()?);

	axum::serve(listener, warden_api::server(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("run axum")
}

/// Initializes the tracing subscriber.
///
/// Logs go to stderr; with `WARDEN_LOG_DIR` set, a daily-rotated file gets a copy. The
/// returned guard must stay alive for the file writer to flush.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("warden_api=info,tower_http=info"));

	match std::env::var("WARDEN_LOG_DIR") {
		Ok(dir) => {
			let appender = tracing_appender::rolling::daily(dir, "warden-api.log");
			let (writer, guard) = tracing_appender::non_blocking(appender);

			tracing_subscriber::fmt()
				.with_env_filter(filter)
				.with_writer(writer)
				.with_ansi(false)
				.init();

			Some(guard)
		}
		Err(_) => {
			tracing_subscriber::fmt().with_env_filter(filter).init();

			None
		}
	}
}

/// Resolves when the process is asked to shut down.
async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c()
			.await
			.expect("failed to listen for ctrl-c");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to listen for SIGTERM")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {}
		_ = terminate => {}
	}

	tracing::info!("shutting down");
}
