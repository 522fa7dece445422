//! Current principal, behind the request gate.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::CurrentPrincipal;
use crate::db::{Database, Principal};

pub fn router(db: Database) -> Router {
    Router::new().route("/me", get(me)).with_state(db)
}

#[derive(Serialize)]
struct MeResponse {
    user: Principal,
}

async fn me(
    State(db): State<Database>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    let user = db
        .users()
        .get_by_id(principal.id)
        .await
        .or_internal("Failed to get user")?
        .ok_or_else(|| ApiError::unauthenticated("User not found"))?;

    Ok(Json(MeResponse { user }))
}
