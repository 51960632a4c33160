/**
 * Route Sync Agent Entry Point
 *
 * Runs the sync service against the configured server and reads control
 * commands from stdin, one per line:
 *
 *   online | offline        report a connectivity change
 *   sync                    request a reconciliation pass
 *   status                  print the current sync state
 *   stops                   list cached stops
 *   add <lat> <lon> <addr>  create a stop
 *   deliver <id>            mark a stop delivered
 *   quit
 *
 * Any other line is delivered as a cache proxy message.
 */

use route_sync::client::sync::{HttpProbe, SyncService};
use route_sync::client::{Config, HttpRemote, LocalStore};
use route_sync::shared::{NewStop, StopStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    tracing::info!("Using server {}", config.server_url());

    let store = Arc::new(LocalStore::new(config.store_config()));
    let remote = Arc::new(HttpRemote::new(config.clone())?);
    let probe = HttpProbe::new(config.server_url());

    let mut service = SyncService::new(config.app(), store, remote);
    let backend = service.start(&probe).await;
    tracing::info!("Local store ready on {:?} backend", backend);

    let handle = service.handle();
    let manager = service.manager();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut words = line.splitn(4, ' ');

        match words.next().unwrap_or_default() {
            "" => continue,
            "quit" | "exit" => break,
            "online" => handle.set_online(true),
            "offline" => handle.set_online(false),
            "sync" => {
                handle.force_sync();
            }
            "status" => {
                let state = handle.state();
                println!(
                    "{} | pending {} | syncing {} | last sync {}",
                    state.network_status,
                    state.pending_operations,
                    state.is_syncing,
                    state
                        .last_sync
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string())
                );
            }
            "stops" => match manager.stops(None).await {
                Ok(stops) => {
                    for stop in stops {
                        println!(
                            "{} #{} {} [{}] ({})",
                            stop.id, stop.sequence, stop.address_full, stop.status, stop.sync_status
                        );
                    }
                }
                Err(e) => eprintln!("Cannot list stops: {}", e),
            },
            "add" => {
                let lat = words.next().and_then(|v| v.parse::<f64>().ok());
                let lon = words.next().and_then(|v| v.parse::<f64>().ok());
                match (lat, lon, words.next()) {
                    (Some(lat), Some(lon), Some(address)) => {
                        match manager.create_stop(NewStop::new(address, lat, lon)).await {
                            Ok(created) => println!("{} {:?}", created.record.id, created.delivery),
                            Err(e) => eprintln!("Cannot create stop: {}", e),
                        }
                    }
                    _ => eprintln!("usage: add <lat> <lon> <address>"),
                }
            }
            "deliver" => match words.next() {
                Some(id) => match manager.update_stop_status(id, StopStatus::Delivered).await {
                    Ok(updated) => println!("{} {:?}", updated.record.id, updated.delivery),
                    Err(e) => eprintln!("Cannot update stop: {}", e),
                },
                None => eprintln!("usage: deliver <id>"),
            },
            _ => {
                handle.post_message(line);
            }
        }
    }

    service.stop().await;
    Ok(())
}
