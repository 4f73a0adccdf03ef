use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::database::new_id;
use crate::error::{ApiError, Result};

/// Carried through checkout so a paid session can be reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutMetadata {
    pub tuition_id: String,
    pub application_id: String,
    pub tutor_email: String,
    pub student_email: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub metadata: CheckoutMetadata,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SessionDetails {
    pub session_id: String,
    pub paid: bool,
    pub transaction_id: Option<String>,
    pub amount: f64,
    pub metadata: CheckoutMetadata,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession>;
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails>;
    /// Releases a session once its payment has been settled. Closing an
    /// unknown session is not an error.
    async fn close_session(&self, session_id: &str) -> Result<()>;
}

/// In-process gateway for development and tests. Sessions live in memory and
/// are paid either immediately (`auto_complete`) or through [`SandboxGateway::complete`].
pub struct SandboxGateway {
    checkout_base: String,
    auto_complete: bool,
    sessions: Mutex<HashMap<String, SessionDetails>>,
}

impl SandboxGateway {
    pub fn new(checkout_base: impl Into<String>, auto_complete: bool) -> SandboxGateway {
        SandboxGateway {
            checkout_base: checkout_base.into(),
            auto_complete,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionDetails>>> {
        self.sessions
            .lock()
            .map_err(|_| ApiError::Gateway("Sandbox session store poisoned".to_string()))
    }

    /// Marks a session paid and returns its transaction id.
    pub fn complete(&self, session_id: &str) -> Result<String> {
        let mut sessions = self.sessions()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("Checkout session not found"))?;
        let transaction_id = session
            .transaction_id
            .get_or_insert_with(|| format!("pi_{}", new_id().replace('-', "")))
            .clone();
        session.paid = true;
        Ok(transaction_id)
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(ApiError::Gateway("Amount must be greater than zero".to_string()));
        }
        let session_id = format!("cs_{}", new_id().replace('-', ""));
        debug!(session = %session_id, amount = request.amount, currency = %request.currency, "sandbox checkout created");

        let details = SessionDetails {
            session_id: session_id.clone(),
            paid: false,
            transaction_id: None,
            amount: request.amount,
            metadata: request.metadata,
        };
        self.sessions()?.insert(session_id.clone(), details);
        if self.auto_complete {
            self.complete(&session_id)?;
        }

        Ok(CheckoutSession {
            url: format!("{}/sandbox-checkout/{}", self.checkout_base, session_id),
            session_id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails> {
        self.sessions()?
            .get(session_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Checkout session not found"))
    }

    async fn close_session(&self, session_id: &str) -> Result<()> {
        if self.sessions()?.remove(session_id).is_some() {
            debug!(session = %session_id, "sandbox session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            amount: 5000.0,
            currency: "bdt".into(),
            description: "Physics tuition".into(),
            metadata: CheckoutMetadata {
                tuition_id: "t1".into(),
                application_id: "a1".into(),
                tutor_email: "tutor@x.com".into(),
                student_email: "student@x.com".into(),
            },
            success_url: "http://localhost/payment/success".into(),
            cancel_url: "http://localhost/payment/cancel".into(),
        }
    }

    #[actix_web::test]
    async fn session_is_unpaid_until_completed() {
        let gateway = SandboxGateway::new("http://localhost", false);
        let session = gateway.create_checkout_session(request()).await.unwrap();
        assert!(session.url.ends_with(&session.session_id));

        let details = gateway.retrieve_session(&session.session_id).await.unwrap();
        assert!(!details.paid);
        assert!(details.transaction_id.is_none());

        let txn = gateway.complete(&session.session_id).unwrap();
        let details = gateway.retrieve_session(&session.session_id).await.unwrap();
        assert!(details.paid);
        assert_eq!(details.transaction_id.as_deref(), Some(txn.as_str()));
        assert_eq!(details.metadata.tutor_email, "tutor@x.com");

        assert_eq!(gateway.complete(&session.session_id).unwrap(), txn);
    }

    #[actix_web::test]
    async fn auto_complete_pays_immediately() {
        let gateway = SandboxGateway::new("http://localhost", true);
        let session = gateway.create_checkout_session(request()).await.unwrap();
        assert!(gateway.retrieve_session(&session.session_id).await.unwrap().paid);
    }

    #[actix_web::test]
    async fn unknown_session_is_not_found() {
        let gateway = SandboxGateway::new("http://localhost", false);
        assert!(matches!(
            gateway.retrieve_session("cs_missing").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn closed_sessions_are_forgotten() {
        let gateway = SandboxGateway::new("http://localhost", true);
        let first = gateway.create_checkout_session(request()).await.unwrap();
        let second = gateway.create_checkout_session(request()).await.unwrap();

        gateway.close_session(&first.session_id).await.unwrap();
        assert!(matches!(
            gateway.retrieve_session(&first.session_id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(gateway.retrieve_session(&second.session_id).await.unwrap().paid);

        gateway.close_session(&first.session_id).await.unwrap();
    }
}
