use actix_web::{delete, get, patch, post, web, HttpResponse};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use crate::data::applications::{Application, ApplicationUpdate, NewApplication};
use crate::data::notifications::{deliver, Notice};
use crate::data::tuitions::TuitionPost;
use crate::error::Result;
use crate::state::AppState;
use crate::utils::enums::ApplicationStatus;
use crate::utils::gate::{StudentCaller, TutorCaller};

#[post("/applications")]
pub async fn apply(
    state: web::Data<AppState>,
    TutorCaller(tutor): TutorCaller,
    body: web::Json<NewApplication>,
) -> Result<HttpResponse> {
    let new = body.into_inner();
    let tutor_name = tutor.name.clone();
    let (application, post) = state
        .db
        .run(move |conn| Application::submit(conn, &tutor.email, new))
        .await?;

    info!(tuition = %post.id, tutor = %application.tutor_email, "application submitted");

    deliver(
        &state.db,
        vec![Notice::new(
            post.student_email.clone(),
            "application",
            format!("{} applied to your {} tuition", tutor_name, post.subject),
        )
        .link(format!("/tuitions/{}/applications", post.id))],
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Application submitted successfully",
        "application": application
    })))
}

// Each application with its post resolved by a second lookup.
fn with_tuitions(conn: &Connection, applications: Vec<Application>) -> Result<Vec<serde_json::Value>> {
    let mut rows = Vec::with_capacity(applications.len());
    for application in applications {
        let tuition = TuitionPost::find(conn, &application.tuition_id)?;
        rows.push(json!({
            "application": application,
            "tuition": tuition
        }));
    }
    Ok(rows)
}

#[get("/applications/mine")]
pub async fn my_applications(
    state: web::Data<AppState>,
    TutorCaller(tutor): TutorCaller,
) -> Result<HttpResponse> {
    let rows = state
        .db
        .run(move |conn| {
            let applications = Application::by_tutor(conn, &tutor.email, None)?;
            with_tuitions(conn, applications)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "applications": rows
    })))
}

#[get("/applications/ongoing")]
pub async fn ongoing_tuitions(
    state: web::Data<AppState>,
    TutorCaller(tutor): TutorCaller,
) -> Result<HttpResponse> {
    let rows = state
        .db
        .run(move |conn| {
            let applications =
                Application::by_tutor(conn, &tutor.email, Some(ApplicationStatus::Accepted))?;
            with_tuitions(conn, applications)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "applications": rows
    })))
}

#[patch("/applications/{id}")]
pub async fn update_application(
    state: web::Data<AppState>,
    TutorCaller(tutor): TutorCaller,
    path: web::Path<String>,
    body: web::Json<ApplicationUpdate>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let update = body.into_inner();
    let application = state
        .db
        .run(move |conn| Application::update(conn, &id, &tutor.email, update))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "application": application
    })))
}

#[delete("/applications/{id}")]
pub async fn withdraw_application(
    state: web::Data<AppState>,
    TutorCaller(tutor): TutorCaller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    state
        .db
        .run(move |conn| Application::withdraw(conn, &id, &tutor.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Application withdrawn"
    })))
}

#[patch("/applications/{id}/reject")]
pub async fn reject_application(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let application = state
        .db
        .run(move |conn| Application::reject(conn, &id, &student.email))
        .await?;

    deliver(
        &state.db,
        vec![Notice::new(
            application.tutor_email.clone(),
            "application",
            "Your application was not selected",
        )
        .link("/applications/mine")],
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Application rejected",
        "application": application
    })))
}
