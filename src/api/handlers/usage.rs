use crate::{
    auth::middleware::AuthUser,
    types::{ModelUsage, Result, TokenReport},
    AppState,
};
use axum::{extract::State, Json};
use std::collections::BTreeMap;

impl From<Vec<ModelUsage>> for TokenReport {
    fn from(details: Vec<ModelUsage>) -> Self {
        let by_model: BTreeMap<String, u64> = details
            .iter()
            .map(|u| (u.model.clone(), u.total_tokens))
            .collect();

        Self {
            total: by_model.values().sum(),
            by_model,
            details,
        }
    }
}

/// Token usage of the caller, per model and in total.
#[utoipa::path(
    get,
    path = "/me/tokens",
    responses(
        (status = 200, description = "Token usage", body = TokenReport),
        (status = 401, description = "Unauthorized")
    ),
    tag = "usage",
    security(("bearer" = []))
)]
pub async fn my_tokens(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TokenReport>> {
    let usage = state.chat.store().get_token_usage(&user_id).await?;
    Ok(Json(usage.into()))
}
