//! HTTP routes for the inference service
//!
//! Thin warp adapter over the core predictor: routes parse and authorize,
//! the core does everything else. Every failure path surfaces as a JSON
//! error body with the taxonomy's status mapping.

use crate::errors::ServiceError;
use crate::state::SharedState;
use crate::types::{ErrorBody, HealthResponse, PredictResponse};
use std::collections::HashMap;
use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};
use triage_core::Record;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Typed rejection carrying the service error taxonomy
#[derive(Debug)]
struct ApiError(ServiceError);

impl warp::reject::Reject for ApiError {}

fn reject(err: ServiceError) -> Rejection {
    warp::reject::custom(ApiError(err))
}

/// Build the full route tree.
///
/// `api_key` gates the predict route when set; `allowed_origins` scopes
/// CORS, with an empty list allowing any origin.
pub fn routes(
    state: SharedState,
    api_key: Option<String>,
    allowed_origins: Vec<String>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let index = warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "message": "Survey triage service is running"
        }))
    });

    let health_state = state.clone();
    let health = warp::path("health").and(warp::get()).map(move || {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        warp::reply::json(&HealthResponse {
            status: health_state.label().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
        })
    });

    let predict_state = state;
    let predict = warp::path("predict")
        .and(warp::post())
        .and(warp::header::optional::<String>("x-api-key"))
        .and(warp::body::json::<HashMap<String, String>>())
        .and_then(move |provided_key: Option<String>, body: HashMap<String, String>| {
            let state = predict_state.clone();
            let expected_key = api_key.clone();
            async move { handle_predict(state, expected_key, provided_key, body).await }
        });

    let mut cors = warp::cors()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type", "x-api-key"]);
    cors = if allowed_origins.is_empty() {
        cors.allow_any_origin()
    } else {
        cors.allow_origins(allowed_origins.iter().map(String::as_str))
    };

    index
        .or(health)
        .or(predict)
        .with(cors)
        .recover(handle_rejection)
}

async fn handle_predict(
    state: SharedState,
    expected_key: Option<String>,
    provided_key: Option<String>,
    body: HashMap<String, String>,
) -> Result<impl Reply, Rejection> {
    if let Some(expected) = expected_key {
        if provided_key.as_deref() != Some(expected.as_str()) {
            return Err(reject(ServiceError::Unauthorized));
        }
    }

    let predictor = state.predictor().map_err(reject)?;

    let record: Record = body.into_iter().collect();
    match predictor.predict(&record) {
        Ok(prediction) => Ok(warp::reply::json(&PredictResponse {
            predicted_condition: prediction.condition,
            treatment_needed: prediction.treatment,
        })),
        // All-or-nothing: a classifier failure mid-request returns no
        // partial labels.
        Err(err) => {
            tracing::error!(error = %err, "prediction failed");
            Err(reject(ServiceError::ModelUnavailable(err.to_string())))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(ApiError(service_err)) = err.find::<ApiError>() {
        let status = match service_err {
            ServiceError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::ModelUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Unauthorized => StatusCode::FORBIDDEN,
        };
        let error = match service_err {
            ServiceError::NotReady => "service_not_ready",
            ServiceError::ModelUnavailable(_) => "model_unavailable",
            ServiceError::Unauthorized => "unauthorized",
        };
        (
            status,
            ErrorBody {
                error: error.to_string(),
                message: service_err.to_string(),
                retryable: service_err.retryable(),
            },
        )
    } else if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            ErrorBody {
                error: "not_found".to_string(),
                message: "No such route".to_string(),
                retryable: false,
            },
        )
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                error: "bad_request".to_string(),
                message: "Request body must be a flat JSON object of strings".to_string(),
                retryable: false,
            },
        )
    } else if err.find::<warp::filters::cors::CorsForbidden>().is_some() {
        (
            StatusCode::FORBIDDEN,
            ErrorBody {
                error: "origin_not_allowed".to_string(),
                message: "Origin not allowed".to_string(),
                retryable: false,
            },
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorBody {
                error: "method_not_allowed".to_string(),
                message: "Method not allowed".to_string(),
                retryable: false,
            },
        )
    } else {
        tracing::error!(?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                error: "internal_server_error".to_string(),
                message: "Internal server error".to_string(),
                retryable: false,
            },
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
