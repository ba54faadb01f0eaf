//! Request bodies checked against their `validator` rules.

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

use crate::dtos::ErrorResponse;

/// JSON body that has already passed `Validate`.
///
/// Syntax errors surface as the usual 400 `AppError::BadRequest`. Rule
/// violations answer 422 with the failing messages grouped by field.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            AppError::BadRequest(anyhow::anyhow!(rejection.body_text())).into_response()
        })?;

        if let Err(errors) = value.validate() {
            tracing::debug!(error = %errors, "Request body failed validation");
            let body = ErrorResponse {
                error: "Validation failed".to_string(),
                fields: Some(field_messages(&errors)),
            };
            return Err((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
        }

        Ok(ValidatedJson(value))
    }
}

/// Field name to its messages; falls back to the rule code when a rule has
/// no message.
fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, failures)| {
            let messages = failures
                .iter()
                .map(|failure| match &failure.message {
                    Some(message) => message.to_string(),
                    None => failure.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}
