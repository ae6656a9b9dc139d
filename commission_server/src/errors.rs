use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use commission_engine::traits::{DedupError, DisputeError, DlqError, LedgerError, PartnerApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The operator API key is missing or does not match")]
    Unauthorized,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::PartnerNotFound(id) => Self::NoRecordFound(format!("Partner {id}")),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<PartnerApiError> for ServerError {
    fn from(e: PartnerApiError) -> Self {
        match e {
            PartnerApiError::PartnerNotFound(id) => Self::NoRecordFound(format!("Partner {id}")),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<DisputeError> for ServerError {
    fn from(e: DisputeError) -> Self {
        match e {
            DisputeError::DisputeNotFound(id) => Self::NoRecordFound(format!("Dispute {id}")),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<DlqError> for ServerError {
    fn from(e: DlqError) -> Self {
        match e {
            DlqError::EntryNotFound(id) => Self::NoRecordFound(format!("Dead letter entry {id}")),
            e @ DlqError::NotDead { .. } => Self::InvalidRequestBody(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<DedupError> for ServerError {
    fn from(e: DedupError) -> Self {
        Self::BackendError(e.to_string())
    }
}
