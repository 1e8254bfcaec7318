// src/web/mod.rs
//! Control API: health, search configuration, manual searches, saved jobs and job actions

pub mod handlers;
pub mod types;

pub use types::*;

use crate::core::{SearchConfig, SearchConfigUpdate};
use crate::runner::SearchSummary;
use crate::types::{FavoriteJob, JobAction};
use anyhow::Result;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catchers, delete, get, options, post, routes, Request, Response, State};
use tracing::{error, info};

type ApiResult<T> = Result<Json<T>, Json<StandardErrorResponse>>;

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
    }
}

#[get("/health")]
pub async fn health() -> Json<TextResponse> {
    handlers::health_handler().await
}

#[get("/config")]
pub async fn get_config(state: &State<ServerState>) -> Json<DataResponse<SearchConfig>> {
    handlers::get_config_handler(state).await
}

#[post("/config", data = "<update>")]
pub async fn update_config(
    update: Json<SearchConfigUpdate>,
    state: &State<ServerState>,
) -> ApiResult<DataResponse<SearchConfig>> {
    handlers::update_config_handler(state, update.into_inner()).await
}

#[post("/search", data = "<request>")]
pub async fn search(
    request: Json<SearchRequest>,
    state: &State<ServerState>,
) -> ApiResult<DataResponse<SearchSummary>> {
    handlers::search_handler(state, request.into_inner()).await
}

#[get("/favorites")]
pub async fn list_favorites(state: &State<ServerState>) -> ApiResult<DataResponse<Vec<FavoriteJob>>> {
    handlers::list_favorites_handler(state).await
}

#[delete("/favorites/<source>/<job_id>")]
pub async fn remove_favorite(
    source: &str,
    job_id: &str,
    state: &State<ServerState>,
) -> ApiResult<ActionResponse> {
    handlers::remove_favorite_handler(state, source, job_id).await
}

#[post("/favorites/<source>/<job_id>/email", data = "<request>")]
pub async fn set_favorite_email(
    source: &str,
    job_id: &str,
    request: Json<EmailRequest>,
    state: &State<ServerState>,
) -> ApiResult<ActionResponse> {
    handlers::set_email_handler(state, source, job_id, request.into_inner()).await
}

#[post("/actions", data = "<action>")]
pub async fn job_action(action: Json<JobAction>, state: &State<ServerState>) -> Json<ActionResponse> {
    handlers::action_handler(state, action.into_inner()).await
}

#[post("/interactions", data = "<request>")]
pub async fn interaction(
    request: Json<InteractionRequest>,
    state: &State<ServerState>,
) -> Json<ActionResponse> {
    handlers::interaction_handler(state, request.into_inner()).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers
#[rocket::catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Invalid request format".to_string(),
        "BAD_REQUEST".to_string(),
        vec!["Check your request JSON format".to_string()],
    ))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Unknown endpoint".to_string(),
        "NOT_FOUND".to_string(),
        vec!["All endpoints live under /api".to_string()],
    ))
}

#[rocket::catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Request body does not match the expected shape".to_string(),
        "UNPROCESSABLE".to_string(),
        vec![
            "Verify all required fields are present".to_string(),
            "Check field types and enum values".to_string(),
        ],
    ))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Internal server error".to_string(),
        "INTERNAL_ERROR".to_string(),
        vec!["Try again in a few moments".to_string()],
    ))
}

pub fn build_rocket(state: ServerState, port: u16) -> rocket::Rocket<rocket::Build> {
    let figment = rocket::Config::figment()
        .merge(("port", port))
        .merge(("address", "0.0.0.0"));

    rocket::custom(figment)
        .attach(Cors)
        .manage(state)
        .register(
            "/api",
            catchers![bad_request, not_found, unprocessable, internal_error],
        )
        .mount(
            "/api",
            routes![
                health,
                get_config,
                update_config,
                search,
                list_favorites,
                remove_favorite,
                set_favorite_email,
                job_action,
                interaction,
                options,
            ],
        )
}

/// Serve the control API until shutdown
pub async fn start_web_server(state: ServerState, port: u16) -> Result<()> {
    info!("Starting JobBot control API on port {}", port);

    if let Err(e) = build_rocket(state, port).launch().await {
        error!("Control API server failed: {}", e);
        anyhow::bail!("Control API server failed: {}", e);
    }

    Ok(())
}
