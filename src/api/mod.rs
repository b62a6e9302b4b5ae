/*
 * REST API module for the savings routing service
 */

use rocket::serde::json::Json;
use rocket::{get, routes, State};
use std::sync::Arc;

use crate::config::Config;
use crate::models::{Direction, RouteDecision};
use crate::utils::parse_wad;

pub struct ApiState {
    pub config: Config,
    pub router_service: Arc<crate::RouterService>,
}

#[get("/api/v1/route?<amount>&<stable_amount>&<direction>")]
pub async fn get_route(
    amount: Option<String>,
    stable_amount: Option<String>,
    direction: Option<String>,
    state: &State<ApiState>,
) -> std::result::Result<Json<RouteDecision>, rocket::response::status::Custom<String>> {
    let live_amount = match amount {
        Some(raw) => parse_wad(&raw).map_err(|e| {
            rocket::response::status::Custom(
                rocket::http::Status::BadRequest,
                format!("Invalid amount: {e}"),
            )
        })?,
        None => parse_wad(&state.config.routing.default_amount_usds).map_err(|e| {
            rocket::response::status::Custom(
                rocket::http::Status::InternalServerError,
                format!("Invalid default amount: {e}"),
            )
        })?,
    };

    let stable_amount = match stable_amount {
        Some(raw) => parse_wad(&raw).map_err(|e| {
            rocket::response::status::Custom(
                rocket::http::Status::BadRequest,
                format!("Invalid stable amount: {e}"),
            )
        })?,
        None => live_amount,
    };

    let direction = match direction.as_deref() {
        None => Direction::Deposit,
        Some(raw) => raw.parse().map_err(|_| {
            rocket::response::status::Custom(
                rocket::http::Status::BadRequest,
                format!("Invalid direction: {raw}"),
            )
        })?,
    };

    let decision = state
        .router_service
        .check_route(stable_amount, live_amount, direction)
        .await
        .map_err(|e| {
            rocket::response::status::Custom(
                rocket::http::Status::InternalServerError,
                format!("Error checking route: {e}"),
            )
        })?;

    Ok(Json(decision))
}

#[get("/metrics")]
pub async fn metrics(
    state: &State<ApiState>,
) -> std::result::Result<String, rocket::response::status::Custom<String>> {
    state.router_service.metrics().export().map_err(|e| {
        rocket::response::status::Custom(
            rocket::http::Status::InternalServerError,
            format!("Error exporting metrics: {e}"),
        )
    })
}

#[get("/health")]
pub async fn health_check() -> &'static str {
    "OK"
}

#[must_use]
pub fn create_rocket(state: ApiState) -> rocket::Rocket<rocket::Build> {
    rocket::build()
        .manage(state)
        .mount("/", routes![get_route, metrics, health_check])
}
