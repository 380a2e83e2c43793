//! Cascade delete handlers.
//!
//! # Endpoints
//!
//! - `DELETE /groups/{id}`
//! - `DELETE /people/{id}`
//! - `DELETE /categories/{id}`
//! - `DELETE /expenses/{id}`
//! - `DELETE /expense-stakes/{id}`
//! - `DELETE /expenses/{expense_id}/categories/{category_id}`

use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode as HttpStatus,
    response::{IntoResponse, Response},
    routing::delete,
};
use splitter_core::cascade::CascadeError;
use splitter_core::entities::ResourceKind;
use splitter_core::events::is_valid_token;
use splitter_sdk::objects::{ErrorBody, ErrorReason, StatusCode};
use std::sync::Arc;

/// Build the delete router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups/{id}", delete(delete_group))
        .route("/people/{id}", delete(delete_person))
        .route("/categories/{id}", delete(delete_category))
        .route("/expenses/{id}", delete(delete_expense))
        .route("/expense-stakes/{id}", delete(delete_expense_stake))
        .route(
            "/expenses/{expense_id}/categories/{category_id}",
            delete(delete_expense_category_relation),
        )
}

async fn delete_group(state: State<AppState>, Path(id): Path<String>) -> Response {
    delete_resource(&state, ResourceKind::Group, &id).await
}

async fn delete_person(state: State<AppState>, Path(id): Path<String>) -> Response {
    delete_resource(&state, ResourceKind::Person, &id).await
}

async fn delete_category(state: State<AppState>, Path(id): Path<String>) -> Response {
    delete_resource(&state, ResourceKind::Category, &id).await
}

async fn delete_expense(state: State<AppState>, Path(id): Path<String>) -> Response {
    delete_resource(&state, ResourceKind::Expense, &id).await
}

async fn delete_expense_stake(state: State<AppState>, Path(id): Path<String>) -> Response {
    delete_resource(&state, ResourceKind::ExpenseStake, &id).await
}

async fn delete_expense_category_relation(
    state: State<AppState>,
    Path((expense_id, category_id)): Path<(String, String)>,
) -> Response {
    if !is_valid_token(&expense_id) || !is_valid_token(&category_id) {
        return DeleteApiError::InvalidId.into_response();
    }
    let result = state.cascade.delete_relation(&expense_id, &category_id).await;
    respond(result.map(|_| ()), &state.error_domain)
}

async fn delete_resource(state: &AppState, kind: ResourceKind, id: &str) -> Response {
    if !is_valid_token(id) {
        return DeleteApiError::InvalidId.into_response();
    }
    let result = state.cascade.delete(kind, id).await;
    respond(result.map(|_| ()), &state.error_domain)
}

fn respond(result: Result<(), CascadeError>, error_domain: &Arc<str>) -> Response {
    match result {
        Ok(()) => HttpStatus::NO_CONTENT.into_response(),
        Err(err) => DeleteApiError::Cascade(err, error_domain.clone()).into_response(),
    }
}

/// Errors returned by the delete endpoints.
enum DeleteApiError {
    InvalidId,
    Cascade(CascadeError, Arc<str>),
}

impl IntoResponse for DeleteApiError {
    fn into_response(self) -> Response {
        let (http, body) = match self {
            DeleteApiError::InvalidId => (
                HttpStatus::BAD_REQUEST,
                ErrorBody::new(StatusCode::InvalidArgument, "id is not a valid identifier"),
            ),
            DeleteApiError::Cascade(CascadeError::NotFound, _) => (
                HttpStatus::NOT_FOUND,
                ErrorBody::new(StatusCode::NotFound, "resource not found"),
            ),
            DeleteApiError::Cascade(err @ CascadeError::Publish(_), domain) => {
                tracing::error!(error = %err, "Cascade delete publish failed");
                (
                    HttpStatus::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(StatusCode::Internal, "failed to publish deletion")
                        .with_reason(ErrorReason::MessagePublicationFailed, &*domain),
                )
            }
            DeleteApiError::Cascade(err, domain) => {
                tracing::error!(error = %err, "Cascade delete failed");
                (
                    HttpStatus::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(StatusCode::Internal, "failed to delete resource")
                        .with_reason(ErrorReason::DbDeleteFailed, &*domain),
                )
            }
        };
        (http, Json(body)).into_response()
    }
}
