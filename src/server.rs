//! The network-facing request collaborator (§6): one HTTP endpoint accepting the documented
//! `{"type":"route",...}` JSON body and returning the documented Leg array or `{"error":...}`.
//!
//! Grounded on the teacher's `server/server.rs` (`actix-web` app wiring, `HttpServer::bind`) and
//! `server/cors.rs` (the `Cors` middleware builder); the single-endpoint, single-response-per-
//! connection shape is this crate's own, since the teacher's server exposes a GET-only GeoJSON
//! dump rather than a request/response protocol.

use std::net::SocketAddr;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{post, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::itinerary::Itinerary;
use crate::map::Position;
use crate::planner::Planner;

/// Shared, mutex-guarded planner state. A* itself is synchronous and single-threaded (§5); the
/// mutex only serializes concurrent requests against each other, it does not parallelize a single
/// search.
pub struct AppState {
    pub planner: Mutex<Planner>,
}

#[derive(Debug, Deserialize)]
struct RouteRequest {
    #[serde(rename = "type")]
    kind: String,
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

#[post("/route")]
async fn route(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request: RouteRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!("rejecting malformed route request: {}", e);
            return invalid_response();
        }
    };

    if request.kind != "route" {
        warn!("rejecting route request with unexpected type '{}'", request.kind);
        return invalid_response();
    }

    let from = Position::new(request.x1, request.y1);
    let to = Position::new(request.x2, request.y2);

    let outcome = {
        let mut planner = state.planner.lock().expect("planner mutex poisoned");
        planner.plan_route(from, to, request.timeout)
    };

    match outcome {
        Ok(itinerary) => {
            match &itinerary {
                Itinerary::Legs(legs) => info!("route {} -> {} resolved to {} leg(s)", from, to, legs.len()),
                Itinerary::NotReachable => info!("route {} -> {} has no legs", from, to),
            }
            HttpResponse::Ok().insert_header((header::CONNECTION, "close")).json(&itinerary)
        }
        Err(RouteError::Timeout) => {
            HttpResponse::Ok()
                .insert_header((header::CONNECTION, "close"))
                .json(ErrorResponse { error: "timeout" })
        }
        Err(RouteError::InvalidRequest(msg)) => {
            warn!("invalid route request: {}", msg);
            invalid_response()
        }
        Err(err) => {
            error!("route request {} -> {} failed: {}", from, to, err);
            HttpResponse::InternalServerError()
                .insert_header((header::CONNECTION, "close"))
                .json(ErrorResponse { error: "internal" })
        }
    }
}

fn invalid_response() -> HttpResponse {
    HttpResponse::BadRequest()
        .insert_header((header::CONNECTION, "close"))
        .json(ErrorResponse { error: "Invalid" })
}

fn cors_middleware() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["POST"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

/// Binds and runs the server until shutdown. `state` is shared across all workers.
pub async fn start_server(address: &str, port: u16, state: web::Data<AppState>) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .expect("invalid network_interface address/port");

    info!("starting route-planning server on {}", addr);
    HttpServer::new(move || App::new().wrap(cors_middleware()).app_data(state.clone()).service(route))
        .bind(addr)?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::heuristic::HeuristicCache;
    use crate::map::Map;
    use actix_web::{test, App};

    fn test_state() -> web::Data<AppState> {
        let planner = Planner::new(Map::new(), &Config::default(), HeuristicCache::new());
        web::Data::new(AppState { planner: Mutex::new(planner) })
    }

    #[actix_web::test]
    async fn valid_request_returns_leg_array() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).service(route)).await;
        let req = test::TestRequest::post()
            .uri("/route")
            .set_json(serde_json::json!({"type":"route","x1":0,"y1":0,"x2":3,"y2":0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body.as_array().unwrap().len() >= 1);
    }

    #[actix_web::test]
    async fn malformed_body_yields_invalid_error() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).service(route)).await;
        let req = test::TestRequest::post().uri("/route").set_payload("not json").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid");
    }

    #[actix_web::test]
    async fn start_equal_end_serializes_as_empty_array() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).service(route)).await;
        let req = test::TestRequest::post()
            .uri("/route")
            .set_json(serde_json::json!({"type":"route","x1":2,"y1":2,"x2":2,"y2":2}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[actix_web::test]
    async fn timeout_surfaces_as_timeout_error() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).service(route)).await;
        let req = test::TestRequest::post()
            .uri("/route")
            .set_json(serde_json::json!({"type":"route","x1":0,"y1":0,"x2":1000000,"y2":1000000,"timeout":1}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "timeout");
    }
}
