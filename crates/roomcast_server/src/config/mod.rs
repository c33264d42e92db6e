#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use serde::Deserialize;
use tracing::info;

/// Default config path: `~/.roomcast/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".roomcast").join("config.toml"))
}

/// Load the server config from TOML and env overrides.
#[allow(dead_code)]
pub fn load_server_config() -> anyhow::Result<ServerConfig> {
	let path = default_config_path()?;
	load_server_config_from_path(&path)
}

/// Same as `load_server_config` but with an explicit config path.
pub fn load_server_config_from_path(path: &Path) -> anyhow::Result<ServerConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ServerConfig::from_file(file_cfg);

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

/// Server config (v1).
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub server: ServerSettings,
	pub relay: RelaySettings,
}

/// Listener and observability settings.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
	/// Bind endpoint (`quic://host:port`); CLI `--bind` wins over this.
	pub bind: Option<String>,
	/// PEM-encoded certificate path for QUIC/TLS.
	pub tls_cert_path: Option<PathBuf>,
	/// PEM-encoded private key path for QUIC/TLS.
	pub tls_key_path: Option<PathBuf>,
	/// Optional metrics exporter bind address (host:port).
	pub metrics_bind: Option<String>,
	/// Optional health/readiness HTTP bind address (host:port).
	pub health_bind: Option<String>,
	/// Origins allowed to connect. Empty list allows all.
	pub allowed_origins: Vec<String>,
	/// Development posture: process faults terminate instead of being
	/// logged and survived.
	pub development: bool,
}

/// Relay core settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
	/// Maximum members per room.
	pub room_capacity: usize,
	/// Grace window before an emptied room is deleted.
	pub empty_room_grace: Duration,
	/// Maximum single-frame payload size in bytes.
	pub max_frame_bytes: usize,
	/// Outbound queue depth per connection.
	pub outbound_queue_capacity: usize,
}

impl Default for RelaySettings {
	fn default() -> Self {
		Self {
			room_capacity: 10,
			empty_room_grace: Duration::from_secs(5),
			max_frame_bytes: roomcast_protocol::DEFAULT_MAX_FRAME_SIZE,
			outbound_queue_capacity: 1024,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	server: FileServerSettings,

	#[serde(default)]
	relay: FileRelaySettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	bind: Option<String>,
	tls_cert_path: Option<String>,
	tls_key_path: Option<String>,
	metrics_bind: Option<String>,
	health_bind: Option<String>,
	#[serde(default)]
	allowed_origins: Vec<String>,
	development: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileRelaySettings {
	room_capacity: Option<usize>,
	empty_room_grace_secs: Option<u64>,
	max_frame_bytes: Option<usize>,
	outbound_queue_capacity: Option<usize>,
}

impl ServerConfig {
	fn from_file(file: FileConfig) -> Self {
		let defaults = RelaySettings::default();

		Self {
			server: ServerSettings {
				bind: file.server.bind.filter(|s| !s.trim().is_empty()),
				tls_cert_path: file.server.tls_cert_path.filter(|s| !s.trim().is_empty()).map(PathBuf::from),
				tls_key_path: file.server.tls_key_path.filter(|s| !s.trim().is_empty()).map(PathBuf::from),
				metrics_bind: file.server.metrics_bind.filter(|s| !s.trim().is_empty()),
				health_bind: file.server.health_bind.filter(|s| !s.trim().is_empty()),
				allowed_origins: file
					.server
					.allowed_origins
					.into_iter()
					.map(|s| s.trim().to_string())
					.filter(|s| !s.is_empty())
					.collect(),
				development: file.server.development.unwrap_or(false),
			},
			relay: RelaySettings {
				room_capacity: file.relay.room_capacity.unwrap_or(defaults.room_capacity),
				empty_room_grace: file
					.relay
					.empty_room_grace_secs
					.map(Duration::from_secs)
					.unwrap_or(defaults.empty_room_grace),
				max_frame_bytes: file.relay.max_frame_bytes.unwrap_or(defaults.max_frame_bytes),
				outbound_queue_capacity: file
					.relay
					.outbound_queue_capacity
					.unwrap_or(defaults.outbound_queue_capacity),
			},
		}
	}
}

fn parse_env_bool(v: &str) -> Option<bool> {
	match v.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(cfg: &mut ServerConfig) {
	if let Ok(v) = std::env::var("ROOMCAST_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.bind = Some(v);
			info!("server config: bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("ROOMCAST_TLS_CERT") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.tls_cert_path = Some(PathBuf::from(v));
			info!("server config: tls_cert_path overridden by env");
		}
	}

	if let Ok(v) = std::env::var("ROOMCAST_TLS_KEY") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.tls_key_path = Some(PathBuf::from(v));
			info!("server config: tls_key_path overridden by env");
		}
	}

	if let Ok(v) = std::env::var("ROOMCAST_METRICS_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.metrics_bind = Some(v);
			info!("server config: metrics_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("ROOMCAST_HEALTH_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.health_bind = Some(v);
			info!("server config: health_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("ROOMCAST_ALLOWED_ORIGINS") {
		let origins: Vec<String> = v
			.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect();
		if !origins.is_empty() {
			cfg.server.allowed_origins = origins;
			info!("server config: allowed_origins overridden by env");
		}
	}

	if let Ok(v) = std::env::var("ROOMCAST_DEVELOPMENT")
		&& let Some(development) = parse_env_bool(&v)
	{
		cfg.server.development = development;
		info!(development, "server config: development overridden by env");
	}

	if let Ok(v) = std::env::var("ROOMCAST_ROOM_CAPACITY")
		&& let Ok(capacity) = v.trim().parse::<usize>()
	{
		cfg.relay.room_capacity = capacity;
		info!(capacity, "relay config: room_capacity overridden by env");
	}

	if let Ok(v) = std::env::var("ROOMCAST_ROOM_GRACE_SECS")
		&& let Ok(secs) = v.trim().parse::<u64>()
	{
		cfg.relay.empty_room_grace = Duration::from_secs(secs);
		info!(secs, "relay config: empty_room_grace overridden by env");
	}

	if let Ok(v) = std::env::var("ROOMCAST_MAX_FRAME_BYTES")
		&& let Ok(bytes) = v.trim().parse::<usize>()
	{
		cfg.relay.max_frame_bytes = bytes;
		info!(bytes, "relay config: max_frame_bytes overridden by env");
	}

	if let Ok(v) = std::env::var("ROOMCAST_OUTBOUND_QUEUE_CAPACITY")
		&& let Ok(capacity) = v.trim().parse::<usize>()
	{
		cfg.relay.outbound_queue_capacity = capacity;
		info!(capacity, "relay config: outbound_queue_capacity overridden by env");
	}
}
