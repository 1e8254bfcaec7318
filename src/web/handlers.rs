// src/web/handlers.rs
use crate::core::{SearchConfig, SearchConfigUpdate};
use crate::database::FavoriteRepository;
use crate::runner::SearchSummary;
use crate::types::{FavoriteJob, JobAction};
use crate::web::types::*;

use rocket::serde::json::Json;
use tracing::{error, info};

type ApiResult<T> = Result<Json<T>, Json<StandardErrorResponse>>;

/// Largest manual search window
pub const MAX_SEARCH_DAYS: u32 = 30;

fn error_response(error: String, code: &str, suggestions: &[&str]) -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        error,
        code.to_string(),
        suggestions.iter().map(|s| s.to_string()).collect(),
    ))
}

pub async fn health_handler() -> Json<TextResponse> {
    Json(TextResponse::success(format!(
        "JobBot {} is running",
        env!("CARGO_PKG_VERSION")
    )))
}

pub async fn get_config_handler(state: &ServerState) -> Json<DataResponse<SearchConfig>> {
    let config = state.config_store.load().await;
    Json(DataResponse::success(
        "Current search configuration".to_string(),
        config,
    ))
}

pub async fn update_config_handler(
    state: &ServerState,
    update: SearchConfigUpdate,
) -> ApiResult<DataResponse<SearchConfig>> {
    match state.config_store.update(update).await {
        Ok(config) => {
            info!("Search configuration updated: {:?}", config);
            Ok(Json(DataResponse::success(
                "Search configuration updated".to_string(),
                config,
            )))
        }
        Err(e) => {
            error!("Rejected configuration update: {:#}", e);
            Err(error_response(
                format!("{:#}", e),
                "INVALID_CONFIG",
                &[
                    "Radius must be a positive number of kilometers",
                    "Execution time uses 24-hour HH:MM",
                    "Work type is one of all, remote, hybrid, onsite",
                ],
            ))
        }
    }
}

pub async fn search_handler(
    state: &ServerState,
    request: SearchRequest,
) -> ApiResult<DataResponse<SearchSummary>> {
    let days = request.days.unwrap_or(1);
    if days == 0 || days > MAX_SEARCH_DAYS {
        return Err(error_response(
            format!("days must be between 1 and {}", MAX_SEARCH_DAYS),
            "INVALID_DAYS",
            &["Send {\"days\": 1} to search the last day"],
        ));
    }

    info!("Manual search requested for the last {} days", days);

    match state.runner.run_search(days).await {
        Ok(summary) => Ok(Json(DataResponse::success(
            format!("{} new jobs found", summary.found),
            summary,
        ))),
        Err(e) => Err(error_response(
            format!("Search failed: {:#}", e),
            "SEARCH_FAILED",
            &["Check the data directory is writable", "Try again later"],
        )),
    }
}

pub async fn list_favorites_handler(state: &ServerState) -> ApiResult<DataResponse<Vec<FavoriteJob>>> {
    match FavoriteRepository::new(&state.pool).list().await {
        Ok(favorites) => Ok(Json(DataResponse::success(
            format!("{} saved jobs", favorites.len()),
            favorites,
        ))),
        Err(e) => {
            error!("Failed to list saved jobs: {:#}", e);
            Err(error_response(
                "Failed to list saved jobs".to_string(),
                "DATABASE_ERROR",
                &["Try again in a few moments"],
            ))
        }
    }
}

pub async fn remove_favorite_handler(
    state: &ServerState,
    source: &str,
    job_id: &str,
) -> ApiResult<ActionResponse> {
    match FavoriteRepository::new(&state.pool).remove(source, job_id).await {
        Ok(true) => Ok(Json(ActionResponse::new(
            true,
            format!("Removed {}:{}", source, job_id),
            "remove".to_string(),
        ))),
        Ok(false) => Err(error_response(
            format!("No saved job {}:{}", source, job_id),
            "NOT_FOUND",
            &["List saved jobs with GET /api/favorites"],
        )),
        Err(e) => {
            error!("Failed to remove saved job: {:#}", e);
            Err(error_response(
                "Failed to remove saved job".to_string(),
                "DATABASE_ERROR",
                &["Try again in a few moments"],
            ))
        }
    }
}

pub async fn set_email_handler(
    state: &ServerState,
    source: &str,
    job_id: &str,
    request: EmailRequest,
) -> ApiResult<ActionResponse> {
    match FavoriteRepository::new(&state.pool)
        .set_email(source, job_id, &request.email)
        .await
    {
        Ok(true) => Ok(Json(ActionResponse::new(
            true,
            format!("Contact email set for {}:{}", source, job_id),
            "set-email".to_string(),
        ))),
        Ok(false) => Err(error_response(
            format!("No saved job {}:{}", source, job_id),
            "NOT_FOUND",
            &["Save the job before setting an email"],
        )),
        Err(e) => Err(error_response(
            format!("{:#}", e),
            "INVALID_EMAIL",
            &["Provide an address like jobs@example.com"],
        )),
    }
}

pub async fn action_handler(state: &ServerState, action: JobAction) -> Json<ActionResponse> {
    let name = action.name().to_string();
    let outcome = state.dispatcher.dispatch(action).await;
    Json(ActionResponse::new(outcome.success, outcome.message, name))
}

pub async fn interaction_handler(state: &ServerState, request: InteractionRequest) -> Json<ActionResponse> {
    let action = request
        .custom_id
        .split_once('|')
        .map(|(name, _)| name.to_string())
        .unwrap_or_default();
    let outcome = state.dispatcher.dispatch_custom_id(&request.custom_id).await;
    Json(ActionResponse::new(outcome.success, outcome.message, action))
}
