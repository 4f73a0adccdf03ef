use std::sync::Arc;

use crate::data::database::Database;
use crate::utils::gateway::PaymentGateway;
use crate::utils::identity::IdentityVerifier;

/// Everything a handler needs, built once in `main` and shared through `web::Data`.
pub struct AppState {
    pub db: Database,
    pub identity: Arc<dyn IdentityVerifier>,
    pub payments: Arc<dyn PaymentGateway>,
    pub client_url: String,
}

impl AppState {
    pub fn new(
        db: Database,
        identity: Arc<dyn IdentityVerifier>,
        payments: Arc<dyn PaymentGateway>,
        client_url: impl Into<String>,
    ) -> AppState {
        AppState {
            db,
            identity,
            payments,
            client_url: client_url.into(),
        }
    }
}
