use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] stockpred_core::ValidationError),

    #[error(transparent)]
    Prediction(#[from] stockpred_core::PredictionError),

    #[error(transparent)]
    Model(#[from] stockpred_core::ModelError),

    #[error("no model artifact at {path}; pass --model or use --mock")]
    MissingModel { path: String },

    #[error(transparent)]
    Warehouse(#[from] stockpred_warehouse::WarehouseError),

    #[error(transparent)]
    Web(#[from] stockpred_web::WebError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Prediction(error) if error.is_client_error() => 2,
            Self::Prediction(_) => 3,
            Self::Model(_) | Self::MissingModel { .. } => 3,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) | Self::Web(_) | Self::Io(_) => 10,
        }
    }
}
