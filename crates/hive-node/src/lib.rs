pub mod api;
pub mod auth;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;
pub mod round;

pub use api::{router, start_api_server, AppState};
pub use auth::{SignedRequest, TRANSACTION_ID_HEADER};
pub use config::NodeConfig;
pub use error::{ApiError, ApiResponse};
pub use round::{Payout, RoundRunner};
