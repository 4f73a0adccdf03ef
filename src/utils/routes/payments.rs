use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::data::applications::Application;
use crate::data::hiring::{settle, SettleOutcome, Settlement};
use crate::data::notifications::{deliver, Notice};
use crate::data::payments::{self, Payment};
use crate::data::tuitions::TuitionPost;
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::utils::enums::{ApplicationStatus, Role, TuitionStatus};
use crate::utils::gate::{Member, StudentCaller};
use crate::utils::gateway::{CheckoutMetadata, CheckoutRequest};

const CURRENCY: &str = "bdt";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub application_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    pub session_id: String,
}

fn hire_notices(outcome: &SettleOutcome) -> Vec<Notice> {
    let subject = &outcome.tuition.subject;
    let mut notices = vec![
        Notice::new(
            outcome.application.tutor_email.clone(),
            "hired",
            format!("You have been hired for the {} tuition", subject),
        )
        .link("/applications/ongoing"),
        Notice::new(
            outcome.payment.student_email.clone(),
            "payment",
            format!("Payment of {:.2} received for the {} tuition", outcome.payment.amount, subject),
        )
        .link("/payments/mine"),
    ];
    notices.extend(outcome.rejected_tutors.iter().map(|tutor| {
        Notice::new(
            tutor.clone(),
            "application",
            format!("The {} tuition has been assigned to another tutor", subject),
        )
    }));
    notices
}

async fn settle_and_notify(
    state: &AppState,
    student_email: String,
    settlement: Settlement,
) -> Result<SettleOutcome> {
    let outcome = state
        .db
        .run(move |conn| settle(conn, &student_email, settlement))
        .await?;
    deliver(&state.db, hire_notices(&outcome)).await;
    Ok(outcome)
}

fn settled(outcome: SettleOutcome) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Payment recorded and tutor hired",
        "payment": outcome.payment,
        "tuition": outcome.tuition,
        "application": outcome.application
    }))
}

#[post("/payments/checkout")]
pub async fn create_checkout(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    body: web::Json<CheckoutBody>,
) -> Result<HttpResponse> {
    let application_id = body.into_inner().application_id;
    let student_email = student.email.clone();
    let (post, application) = state
        .db
        .run(move |conn| {
            let application = Application::get(conn, &application_id)?;
            let post = TuitionPost::get(conn, &application.tuition_id)?;
            if post.student_email != student_email {
                return Err(ApiError::forbidden("You can only pay for your own tuition posts"));
            }
            match post.status {
                TuitionStatus::Approved => {}
                TuitionStatus::Assigned => {
                    return Err(ApiError::conflict("A tutor has already been assigned to this tuition"))
                }
                _ => return Err(ApiError::bad_request("This tuition post is not approved")),
            }
            if application.status != ApplicationStatus::Pending {
                return Err(ApiError::conflict("This application is no longer pending"));
            }
            Ok((post, application))
        })
        .await?;

    let amount = application.expected_salary.unwrap_or(post.salary);
    let session = state
        .payments
        .create_checkout_session(CheckoutRequest {
            amount,
            currency: CURRENCY.to_string(),
            description: format!("{} tuition ({})", post.subject, post.class_level),
            metadata: CheckoutMetadata {
                tuition_id: post.id.clone(),
                application_id: application.id.clone(),
                tutor_email: application.tutor_email.clone(),
                student_email: student.email.clone(),
            },
            success_url: format!("{}/payment/success", state.client_url),
            cancel_url: format!("{}/payment/cancel", state.client_url),
        })
        .await?;

    info!(session = %session.session_id, tuition = %post.id, amount, "checkout session created");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "sessionId": session.session_id,
        "url": session.url,
        "amount": amount
    })))
}

// Reconciles a paid checkout session and runs the hire.
#[post("/payments/confirm")]
pub async fn confirm_checkout(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    body: web::Json<ConfirmBody>,
) -> Result<HttpResponse> {
    let session_id = body.into_inner().session_id;
    let details = state.payments.retrieve_session(&session_id).await?;

    if !details.paid {
        return Err(ApiError::bad_request("Payment has not been completed"));
    }
    if details.metadata.student_email != student.email {
        warn!(session = %session_id, caller = %student.email, "checkout confirmed by another student");
        return Err(ApiError::forbidden("This checkout session belongs to another student"));
    }
    let transaction_id = details
        .transaction_id
        .ok_or_else(|| ApiError::Gateway("Paid session carries no transaction id".to_string()))?;

    let settlement = Settlement {
        tuition_id: details.metadata.tuition_id,
        application_id: details.metadata.application_id,
        tutor_email: details.metadata.tutor_email,
        amount: details.amount,
        transaction_id,
    };
    let outcome = settle_and_notify(&state, student.email, settlement).await?;
    if let Err(e) = state.payments.close_session(&session_id).await {
        warn!(session = %session_id, error = %e, "settled checkout session could not be closed");
    }
    Ok(settled(outcome))
}

#[post("/payments")]
pub async fn record_payment(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    body: web::Json<Settlement>,
) -> Result<HttpResponse> {
    let outcome = settle_and_notify(&state, student.email, body.into_inner()).await?;
    Ok(settled(outcome))
}

#[get("/payments/mine")]
pub async fn my_payments(
    state: web::Data<AppState>,
    Member(user): Member,
) -> Result<HttpResponse> {
    let role = user.role;
    let email = user.email;
    let history = state
        .db
        .run(move |conn| match role {
            Role::Student => Payment::by_student(conn, &email),
            Role::Tutor => Payment::by_tutor(conn, &email),
            Role::Admin => Err(ApiError::forbidden("Admins have no payment history")),
        })
        .await?;

    let body = if role == Role::Tutor {
        json!({
            "success": true,
            "payments": history,
            "totalEarnings": payments::sum(&history)
        })
    } else {
        json!({
            "success": true,
            "payments": history
        })
    };
    Ok(HttpResponse::Ok().json(body))
}
