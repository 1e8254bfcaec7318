// src/web/types.rs
use crate::actions::ActionDispatcher;
use crate::core::SearchConfigStore;
use crate::runner::SearchRunner;
use rocket::serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared by every route
pub struct ServerState {
    pub runner: Arc<SearchRunner>,
    pub config_store: SearchConfigStore,
    pub pool: SqlitePool,
    pub dispatcher: ActionDispatcher,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct SearchRequest {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct EmailRequest {
    pub email: String,
}

/// A chat button press forwarded by the gateway
#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct InteractionRequest {
    pub custom_id: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

impl TextResponse {
    pub fn success(message: String) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message,
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: String, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message,
            data,
        }
    }
}

impl ActionResponse {
    pub fn new(success: bool, message: String, action: String) -> Self {
        Self {
            response_type: ResponseType::Action,
            success,
            message,
            action,
        }
    }
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
        }
    }
}
