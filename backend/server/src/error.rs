use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bank::LifecycleError;
use thiserror::Error;

use crate::{config::ConfigError, database::StoreError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Lifecycle(LifecycleError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            AppError::Lifecycle(_) => StatusCode::FORBIDDEN,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::DuplicateMonth(_)) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use bank::{Action, CouponState, Role};

    use super::*;

    #[test]
    fn test_status_mapping() {
        let forbidden = AppError::from(LifecycleError::Forbidden {
            action: Action::Approve,
            role: Role::Recipient,
        });
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.to_string(), "The recipient cannot approve a coupon");

        let invalid = AppError::from(LifecycleError::InvalidTransition {
            action: Action::Save,
            state: CouponState::Used,
        });
        assert_eq!(invalid.status(), StatusCode::CONFLICT);

        let hidden = AppError::from(LifecycleError::NotRevealable { month: 9 });
        assert_eq!(hidden.status(), StatusCode::FORBIDDEN);

        let rejected = AppError::from(StoreError::Rejected {
            status: 500,
            body: "boom".into(),
        });
        assert_eq!(rejected.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(
            AppError::from(StoreError::NotFound("coupon-1".into())).status(),
            StatusCode::NOT_FOUND
        );
    }
}
