#![forbid(unsafe_code)]

mod config;
mod quic;
mod server;
mod util;

use std::net::SocketAddr;

use roomcast_domain::ConnId;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::quic::config::QuicServerConfig;
use crate::server::connection::{ConnectionSettings, handle_connection};
use crate::server::health::{HealthState, spawn_health_server};
use crate::server::relay::{Relay, RelayConfig};
use crate::util::endpoint::parse_bind_endpoint;

const DEFAULT_BIND: &str = "quic://127.0.0.1:3001";

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: roomcast_server [--bind quic://host:port]\n\
\n\
Options:\n\
\t--bind    Bind endpoint (default: {DEFAULT_BIND})\n\
\t         Format: quic://host:port\n\
\t--help   Show this help\n\
"
	);
	std::process::exit(2)
}

fn parse_args() -> Option<String> {
	let mut bind_endpoint = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--bind" | "--listen" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--bind must be non-empty (expected quic://host:port)");
					usage_and_exit();
				}
				bind_endpoint = Some(v);
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	bind_endpoint
}

fn init_rustls_crypto_provider() {
	let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,roomcast_server=debug".to_string());

	let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
		.ok()
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty());
	let base = tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false));

	if let Some(endpoint) = otlp_endpoint {
		use opentelemetry::global;
		use opentelemetry::trace::TracerProvider as _;
		use opentelemetry_otlp::WithExportConfig;

		match opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.with_endpoint(endpoint.clone())
			.build()
		{
			Ok(exporter) => {
				let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
					.with_batch_exporter(exporter)
					.build();
				let tracer = tracer_provider.tracer("roomcast_server");
				global::set_tracer_provider(tracer_provider);

				let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
				base.with(otel_layer).init();
				info!(endpoint = %endpoint, "otlp tracing enabled");
			}
			Err(e) => {
				base.init();
				warn!(error = %e, "failed to initialize otlp tracing");
			}
		}
	} else {
		base.init();
	}
}

fn init_metrics(bind: Option<&str>) {
	let Some(bind) = bind else {
		return;
	};

	match bind.parse::<SocketAddr>() {
		Ok(addr) => {
			if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
				.with_http_listener(addr)
				.install()
			{
				warn!(error = %e, "failed to start metrics exporter");
			} else {
				info!(%addr, "metrics exporter listening");
			}
		}
		Err(e) => {
			warn!(error = %e, %bind, "invalid metrics bind address (expected host:port)");
		}
	}
}

/// Process-fault posture: log every panic; terminate only in development,
/// in production keep serving and leave recovery to the process manager.
fn init_panic_hook(development: bool) {
	let default_hook = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |panic_info| {
		tracing::error!(panic = %panic_info, "uncaught panic");
		default_hook(panic_info);
		if development {
			std::process::exit(1);
		}
	}));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_rustls_crypto_provider();
	init_tracing();

	let bind_arg = parse_args();

	let config_path = crate::config::default_config_path()?;
	let server_cfg = crate::config::load_server_config_from_path(&config_path)?;
	info!(path = %config_path.display(), "loaded server config (toml + env overrides)");

	init_panic_hook(server_cfg.server.development);
	init_metrics(server_cfg.server.metrics_bind.as_deref());

	let bind_endpoint = bind_arg
		.or_else(|| server_cfg.server.bind.clone())
		.unwrap_or_else(|| DEFAULT_BIND.to_string());
	let bind_addr = parse_bind_endpoint(&bind_endpoint).unwrap_or_else(|e| {
		eprintln!("{e}");
		usage_and_exit();
	});

	let relay = Relay::new(RelayConfig {
		room_capacity: server_cfg.relay.room_capacity,
		empty_room_grace: server_cfg.relay.empty_room_grace,
		outbound_queue_capacity: server_cfg.relay.outbound_queue_capacity,
		debug_logs: server_cfg.server.development,
	});

	let health_state = HealthState::new();
	if let Some(bind) = server_cfg.server.health_bind.as_deref() {
		match bind.parse::<SocketAddr>() {
			Ok(addr) => {
				spawn_health_server(addr, health_state.clone(), relay.clone());
				info!(%addr, "health server listening");
			}
			Err(e) => warn!(error = %e, %bind, "invalid health bind address (expected host:port)"),
		}
	}

	let quic_cfg = QuicServerConfig::new(bind_addr);
	let endpoint = if let (Some(cert_path), Some(key_path)) = (
		server_cfg.server.tls_cert_path.as_deref(),
		server_cfg.server.tls_key_path.as_deref(),
	) {
		info!(cert = %cert_path.display(), key = %key_path.display(), "loading TLS cert/key");
		quic_cfg.bind_endpoint_with_tls(cert_path, key_path)?
	} else {
		let (endpoint, server_cert_der) = quic_cfg.bind_dev_endpoint()?;
		info!(
			bind = %bind_addr,
			cert_der_len = server_cert_der.len(),
			"roomcast_server: QUIC endpoint ready (dev self-signed cert)"
		);
		endpoint
	};

	let conn_settings = ConnectionSettings {
		max_frame_bytes: server_cfg.relay.max_frame_bytes,
		allowed_origins: server_cfg.server.allowed_origins.clone(),
	};

	health_state.mark_ready();
	info!(bind = %bind_addr, "server running");

	loop {
		let Some(connecting) = endpoint.accept().await else {
			break;
		};

		metrics::counter!("roomcast_server_connections_total").increment(1);

		let relay = relay.clone();
		let conn_settings = conn_settings.clone();

		tokio::spawn(async move {
			match connecting.await {
				Ok(connection) => {
					let conn_id = ConnId::generate();
					info!(conn = %conn_id, remote = %connection.remote_address(), "accepted connection");

					if let Err(e) = handle_connection(conn_id.clone(), connection, relay, conn_settings).await {
						warn!(conn = %conn_id, error = %e, "connection handler exited with error");
					}
				}
				Err(e) => {
					warn!(error = %e, "failed to establish QUIC connection");
				}
			}
		});
	}

	Ok(())
}
