//! Embedded app API, authenticated by session token.

use axum::{Json, Router, extract::State, routing::get};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::SessionShop;
use crate::models::ShopRecord;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/shop", get(current_shop))
}

/// GET /api/shop - The installed shop the session token was issued for.
///
/// 404 means the app is not (or no longer) installed on the shop, and the
/// frontend should send the merchant through install again.
#[instrument(skip(state, session), fields(shop = %session.shop))]
async fn current_shop(
    State(state): State<AppState>,
    session: SessionShop,
) -> Result<Json<ShopRecord>, AppError> {
    let record = state
        .store()
        .get_shop(&session.shop)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Shop {} is not installed", session.shop)))?;

    Ok(Json(record))
}
