mod config;
mod resolver;
mod service;
mod zabbix;

use clap::Parser;
use common::{Request, Response};
use config::Config;
use resolver::Resolver;
use service::MaintenanceService;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use zabbix::ZabbixClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file (.yaml, .yml or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let default_path = PathBuf::from(common::DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Config::from_file(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    setup_logging(&config.logging)?;
    log::info!("Starting zabmaint-daemon v{}...", env!("CARGO_PKG_VERSION"));
    log::info!("Zabbix API: {}", config.zabbix.api_url);
    if config.zabbix.token.is_empty() {
        log::warn!("No Zabbix API token configured");
    }

    let client = Arc::new(ZabbixClient::new(&config.zabbix)?);

    // Connection test at startup; a failure is reported but not fatal,
    // Zabbix may simply not be up yet.
    match client.ping().await {
        Ok(()) => log::info!("Zabbix connection OK"),
        Err(e) => log::error!("Zabbix connection error: {:#}", e),
    }

    let resolver = Resolver::new(client.clone(), &config.resolver);
    let service = Arc::new(MaintenanceService::new(client, resolver));

    let configured = config.server.socket_path.clone();
    let (listener, socket_path) = match bind_socket(&configured) {
        Ok(listener) => (listener, configured),
        Err(e) => {
            // Running without the /var/run directory (typically as a
            // non-root user) falls back to a world-accessible tmp socket.
            let fallback = PathBuf::from(common::USER_SOCKET_PATH);
            if fallback == configured {
                return Err(e);
            }
            log::warn!(
                "Cannot bind {:?}: {:#}; falling back to {:?}",
                configured,
                e,
                fallback
            );
            (bind_socket(&fallback)?, fallback)
        }
    };
    log::info!("Listening on {:?}", socket_path);

    loop {
        let (mut socket, _) = listener.accept().await?;
        let service = service.clone();

        tokio::spawn(async move {
            let mut buf = vec![0; 64 * 1024];
            loop {
                let n = match socket.read(&mut buf).await {
                    Ok(0) => return,
                    Ok(n) => n,
                    Err(e) => {
                        log::error!("failed to read from socket; err = {:?}", e);
                        return;
                    }
                };

                let resp = match serde_json::from_slice::<Request>(&buf[0..n]) {
                    Ok(req) => {
                        log::info!("Received request: {}", request_label(&req));
                        service.handle(req).await
                    }
                    Err(e) => Response::Error(format!("Invalid request: {}", e)),
                };

                let resp_bytes = match serde_json::to_vec(&resp) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::error!("failed to serialize response; err = {:?}", e);
                        return;
                    }
                };

                if let Err(e) = socket.write_all(&resp_bytes).await {
                    log::error!("failed to write to socket; err = {:?}", e);
                    return;
                }
            }
        });
    }
}

/// Bind a Unix socket, replacing a stale socket file and opening the
/// permissions so any local user can connect.
fn bind_socket(path: &std::path::Path) -> anyhow::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;

    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o666);
    std::fs::set_permissions(path, perms)?;
    Ok(listener)
}

fn request_label(req: &Request) -> &'static str {
    match req {
        Request::Create(_) => "Create",
        Request::SearchHosts { .. } => "SearchHosts",
        Request::SearchGroups { .. } => "SearchGroups",
        Request::ListMaintenances => "ListMaintenances",
        Request::PreviewRoutine { .. } => "PreviewRoutine",
        Request::Templates => "Templates",
        Request::Health => "Health",
    }
}

fn setup_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let level = config
        .level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d][%H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = &config.output {
        match fern::log_file(path) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(e) => eprintln!(
                "Cannot open log file {:?}: {}; logging to stdout only",
                path, e
            ),
        }
    }

    dispatch.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_socket_replaces_stale_file() {
        let dir = std::env::temp_dir().join("zabmaint-bind-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("daemon.sock");
        std::fs::write(&path, b"stale").unwrap();

        let listener = bind_socket(&path).unwrap();
        drop(listener);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_bind_socket_fails_without_parent_directory() {
        let path = std::path::Path::new("/no-such-dir/zabmaint/daemon.sock");
        assert!(bind_socket(path).is_err());
    }
}
