//! Model catalog endpoint

use crate::core::models::openai::{ModelInfo, ModelList};
use crate::server::state::AppState;
use crate::utils::error::Result;
use actix_web::{HttpResponse, web};

/// Active model catalog in the OpenAI list shape
pub async fn list_models(state: web::Data<AppState>) -> Result<HttpResponse> {
    let models = state.storage.db().list_active_models().await?;
    let data = models
        .into_iter()
        .map(|m| ModelInfo {
            id: m.name,
            object: "model".to_string(),
            created: 0,
            owned_by: "fleetgate".to_string(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(ModelList {
        object: "list".to_string(),
        data,
    }))
}
