// src/handlers/error.rs
use std::fmt;

use warp::http::StatusCode;
use warp::reject::Reject;

use crate::services::error::ServiceError;
use crate::BoxError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status: StatusCode,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

/// Maps a service-layer error onto the right HTTP status. Only `NotFound`
/// and `InvalidInput` are user-visible; everything else is a 500.
pub fn reject_for(err: BoxError) -> warp::Rejection {
    let api_error = match err.downcast_ref::<ServiceError>() {
        Some(ServiceError::NotFound(msg)) => ApiError::not_found(msg.clone()),
        Some(ServiceError::InvalidInput(msg)) => ApiError::bad_request(msg.clone()),
        None => ApiError::internal(err.to_string()),
    };
    warp::reject::custom(api_error)
}
