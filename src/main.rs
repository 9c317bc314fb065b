use std::sync::Mutex;

use actix_web::web;
use clap::Parser;
use log::info;

use transit_planner::cache_store;
use transit_planner::config;
use transit_planner::planner::Planner;
use transit_planner::server::{self, AppState};
use transit_planner::storage::{JsonFileStorage, Storage};

/// Route-planning network server.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the JSON configuration document (§6). Missing file falls back to defaults.
    #[clap(long, default_value = "config.json")]
    config_path: String,

    /// Path to the persisted map document, overriding `storage_provider_config.path`.
    #[clap(long)]
    map_path: Option<String>,

    /// Path to the gzip-compressed heuristic cache, loaded at startup if present.
    #[clap(long, default_value = "heuristic_cache.gz")]
    cache_path: String,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = config::load_config(std::path::Path::new(&args.config_path))
        .expect("failed to load configuration");

    let map_path = args
        .map_path
        .or_else(|| config.storage.storage_provider_config.get("path").and_then(|v| v.as_str()).map(String::from))
        .unwrap_or_else(|| "map.json".to_string());

    let storage = JsonFileStorage::new(&map_path);
    let map = storage.load().expect("failed to load map document");
    info!("loaded {} location(s) from {}", map.locations().count(), map_path);

    let cache = cache_store::load(std::path::Path::new(&args.cache_path)).unwrap_or_else(|e| {
        log::warn!("heuristic cache at {} could not be loaded ({}); starting uncached", args.cache_path, e);
        transit_planner::heuristic::HeuristicCache::new()
    });

    let planner = Planner::new(map, &config, cache);
    let state = web::Data::new(AppState { planner: Mutex::new(planner) });

    server::start_server(&config.network_interface.address, config.network_interface.port, state).await
}
