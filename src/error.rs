use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use thiserror::Error;

/// User-facing outcome of an action: a message plus where to go next.
#[derive(Debug, Serialize)]
pub struct Notice {
    pub notice: String,
    pub redirect: &'static str,
}

impl Notice {
    pub fn new(notice: impl Into<String>, redirect: &'static str) -> Self {
        Notice {
            notice: notice.into(),
            redirect,
        }
    }

    pub fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not logged in")]
    Unauthenticated,
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(StoreError::DuplicateUsername) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let notice = match self {
            AppError::Unauthenticated => Notice::new("Please log in to continue.", "/auth/login"),
            AppError::InvalidToken(_) => {
                Notice::new("Your session has expired. Please log in again.", "/auth/login")
            }
            AppError::Store(StoreError::DuplicateUsername) => Notice::new(
                "Username already exists. Please choose another one.",
                "/auth/register",
            ),
            other => {
                error!("Request failed: {}", other);
                Notice::new("Something went wrong. Please try again.", "/dashboard")
            }
        };
        notice.respond(self.status_code())
    }
}
