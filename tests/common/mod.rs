#![allow(dead_code)]

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use serde_json::Value;

use tuition_backend::data::applications::{Application, NewApplication};
use tuition_backend::data::database::Database;
use tuition_backend::data::tuitions::{NewTuition, TuitionPost};
use tuition_backend::data::users::User;
use tuition_backend::state::AppState;
use tuition_backend::utils::enums::{Role, TuitionStatus};
use tuition_backend::utils::gateway::SandboxGateway;
use tuition_backend::utils::identity::HmacTokenVerifier;

pub const STUDENT: &str = "student@tuition.test";
pub const OTHER_STUDENT: &str = "other.student@tuition.test";
pub const TUTOR: &str = "tutor@tuition.test";
pub const SECOND_TUTOR: &str = "second.tutor@tuition.test";
pub const ADMIN: &str = "admin@tuition.test";

/// In-memory backend with seeded accounts and a manually completed sandbox gateway.
pub struct Harness {
    pub state: web::Data<AppState>,
    pub gateway: Arc<SandboxGateway>,
    verifier: HmacTokenVerifier,
}

impl Harness {
    pub fn new() -> Harness {
        let db = Database::open_in_memory().unwrap();
        let gateway = Arc::new(SandboxGateway::new("http://client.test", false));
        let verifier = HmacTokenVerifier::new("integration-secret").unwrap();
        let state = web::Data::new(AppState::new(
            db,
            Arc::new(HmacTokenVerifier::new("integration-secret").unwrap()),
            gateway.clone(),
            "http://client.test",
        ));

        let harness = Harness { state, gateway, verifier };
        harness.seed(STUDENT, "Sadia", Role::Student);
        harness.seed(OTHER_STUDENT, "Rafi", Role::Student);
        harness.seed(TUTOR, "Tanvir", Role::Tutor);
        harness.seed(SECOND_TUTOR, "Nusrat", Role::Tutor);
        harness.seed(ADMIN, "Admin", Role::Admin);
        harness
    }

    pub fn seed(&self, email: &str, name: &str, role: Role) {
        self.state
            .db
            .with_conn(|conn| {
                User::login(conn, email, Some(name.to_string()), None)?;
                User::set_role(conn, email, role)?;
                Ok(())
            })
            .unwrap();
    }

    /// Posts a tuition as [`STUDENT`] and approves it.
    pub fn approved_tuition(&self, subject: &str) -> String {
        self.state
            .db
            .with_conn(|conn| {
                let post = TuitionPost::create(
                    conn,
                    STUDENT,
                    NewTuition {
                        subject: subject.to_string(),
                        class_level: "Class 9".to_string(),
                        location: "Dhanmondi".to_string(),
                        salary: 6000.0,
                        days_per_week: Some(3),
                        schedule: None,
                        medium: Some("English".to_string()),
                        description: None,
                    },
                )?;
                TuitionPost::set_status(conn, &post.id, TuitionStatus::Approved)?;
                Ok(post.id)
            })
            .unwrap()
    }

    pub fn application(&self, tutor: &str, tuition_id: &str, salary: f64) -> String {
        self.state
            .db
            .with_conn(|conn| {
                let (application, _) = Application::submit(
                    conn,
                    tutor,
                    NewApplication {
                        tuition_id: tuition_id.to_string(),
                        qualifications: Some("BSc".to_string()),
                        experience: Some("2 years".to_string()),
                        expected_salary: Some(salary),
                        message: None,
                    },
                )?;
                Ok(application.id)
            })
            .unwrap()
    }

    pub fn bearer(&self, email: &str) -> (&'static str, String) {
        let token = self.verifier.issue(email, chrono::Duration::hours(1)).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }
}

/// Calls the service and decodes the JSON body (`Null` when empty).
pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}
