//! The offline editor / cache-builder / client CLI (§6's "editor mode", "build-cache action" and
//! "client mode"), following the teacher's `src/bin/ctl.rs` — a single `clap`-derived binary with
//! one subcommand per action, rather than one binary per action.

use clap::{Parser, Subcommand};
use log::info;

use transit_planner::cache_store;
use transit_planner::heuristic::{self, PrecomputeRect};
use transit_planner::itinerary::{self, Leg};
use transit_planner::map::{Location, Position};
use transit_planner::storage::{JsonFileStorage, Storage};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the persisted map document this invocation reads and, for editor subcommands,
    /// writes back to.
    #[arg(long, default_value = "map.json")]
    map_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a Location to the map.
    AddLocation {
        #[arg(long)]
        id: String,
        #[arg(long)]
        label: String,
        #[arg(long)]
        x: i64,
        #[arg(long)]
        y: i64,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove a Location (and every Connection incident to it).
    DeleteLocation {
        #[arg(long)]
        id: String,
    },
    /// Join two existing Locations with a Connection.
    AddConnection {
        #[arg(long)]
        from_id: String,
        #[arg(long)]
        to_id: String,
        #[arg(long, default_value_t = 0)]
        weight: u32,
        #[arg(long)]
        is_train: bool,
        #[arg(long)]
        label: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove the Connection labeled `label` between two Locations.
    DeleteConnection {
        #[arg(long)]
        from_id: String,
        #[arg(long)]
        to_id: String,
        #[arg(long)]
        label: String,
    },
    /// Precompute the heuristic cache over a rectangle (§4.3) and save it to disk.
    BuildCache {
        #[arg(long)]
        min_x: i64,
        #[arg(long)]
        max_x: i64,
        #[arg(long)]
        min_y: i64,
        #[arg(long)]
        max_y: i64,
        #[arg(long, default_value_t = 1)]
        threads: usize,
        #[arg(long, default_value = "heuristic_cache.gz")]
        cache_path: String,
    },
    /// Issue a single route request against a running server and print the itinerary.
    Client {
        #[arg(long, default_value = "127.0.0.1")]
        address: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long)]
        x1: i64,
        #[arg(long)]
        y1: i64,
        #[arg(long)]
        x2: i64,
        #[arg(long)]
        y2: i64,
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[actix_web::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Client { address, port, x1, y1, x2, y2, timeout } => {
            run_client(&address, port, x1, y1, x2, y2, timeout).await
        }
        Command::BuildCache { min_x, max_x, min_y, max_y, threads, cache_path } => {
            run_build_cache(&args.map_path, min_x, max_x, min_y, max_y, threads, &cache_path)
        }
        edit => run_edit(&args.map_path, edit),
    }
}

fn run_edit(map_path: &str, command: Command) {
    let storage = JsonFileStorage::new(map_path);
    let mut map = storage.load().expect("failed to load map document");

    match command {
        Command::AddLocation { id, label, x, y, description } => {
            map.add_location(Location::new(id.clone(), label, Position::new(x, y), description))
                .expect("failed to add location");
            info!("added location '{}' at ({}, {})", id, x, y);
        }
        Command::DeleteLocation { id } => {
            let (idx, _) = map.location_by_id(&id).expect("no such location");
            map.delete_location(idx).expect("failed to delete location");
            info!("deleted location '{}'", id);
        }
        Command::AddConnection { from_id, to_id, weight, is_train, label, description } => {
            let (a, _) = map.location_by_id(&from_id).expect("no such location (from_id)");
            let (b, _) = map.location_by_id(&to_id).expect("no such location (to_id)");
            map.add_connection(weight, is_train, label.clone(), description, a, b)
                .expect("failed to add connection");
            info!("added connection '{}' between '{}' and '{}'", label, from_id, to_id);
        }
        Command::DeleteConnection { from_id, to_id, label } => {
            let (a, loc_a) = map.location_by_id(&from_id).expect("no such location (from_id)");
            let (b, _) = map.location_by_id(&to_id).expect("no such location (to_id)");
            let conn_idx = loc_a
                .connections()
                .iter()
                .copied()
                .find(|&c| {
                    let conn = map.connection(c).expect("dangling connection index");
                    conn.label == label && conn.other_side(a) == Some(b)
                })
                .expect("no such connection");
            map.delete_connection(conn_idx).expect("failed to delete connection");
            info!("deleted connection '{}' between '{}' and '{}'", label, from_id, to_id);
        }
        Command::BuildCache { .. } | Command::Client { .. } => unreachable!("dispatched separately in main"),
    }

    storage.save(&map).expect("failed to save map document");
}

fn run_build_cache(map_path: &str, min_x: i64, max_x: i64, min_y: i64, max_y: i64, threads: usize, cache_path: &str) {
    let storage = JsonFileStorage::new(map_path);
    let map = storage.load().expect("failed to load map document");

    let rect = PrecomputeRect { min_x, max_x, min_y, max_y };
    let total = ((max_x - min_x + 1) * (max_y - min_y + 1)).max(0) as usize;
    info!("precomputing heuristic over {} cell(s) with {} thread(s)", total, threads);

    let cache = heuristic::build_cache(&map, rect, threads, |done, total| {
        info!("heuristic precompute progress: {}/{}", done, total);
    });

    cache_store::save(std::path::Path::new(cache_path), &cache).expect("failed to save heuristic cache");
    info!("saved heuristic cache to {}", cache_path);
}

async fn run_client(address: &str, port: u16, x1: i64, y1: i64, x2: i64, y2: i64, timeout: Option<u64>) {
    let mut body = serde_json::json!({ "type": "route", "x1": x1, "y1": y1, "x2": x2, "y2": y2 });
    if let Some(ms) = timeout {
        body["timeout"] = serde_json::json!(ms);
    }

    let url = format!("http://{}:{}/route", address, port);
    let client = awc::Client::default();
    let mut response = client.post(url.as_str()).send_json(&body).await.expect("route request failed");
    let value: serde_json::Value = response.json().await.expect("malformed response body");

    if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
        eprintln!("route request failed: {}", err);
        return;
    }

    let legs: Vec<Leg> = serde_json::from_value(value).expect("unexpected response shape");
    print_itinerary(&legs);
}

fn print_itinerary(legs: &[Leg]) {
    if legs.is_empty() {
        println!("already there.");
        return;
    }
    for leg in legs {
        println!("{}", itinerary::describe(leg));
    }
}
