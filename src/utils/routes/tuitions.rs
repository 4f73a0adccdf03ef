use actix_web::{delete, get, patch, post, web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::data::applications::Application;
use crate::data::tuitions::{NewTuition, TuitionPost, TuitionQuery, TuitionUpdate};
use crate::data::users::{PublicProfile, User};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::utils::enums::TuitionStatus;
use crate::utils::gate::StudentCaller;

#[post("/tuitions")]
pub async fn create_tuition(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    body: web::Json<NewTuition>,
) -> Result<HttpResponse> {
    let new = body.into_inner();
    let post = state
        .db
        .run(move |conn| TuitionPost::create(conn, &student.email, new))
        .await?;

    info!(id = %post.id, student = %post.student_email, "tuition posted");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Tuition post submitted for review",
        "tuition": post
    })))
}

// Public listing: only approved posts, whatever the client asks for.
#[get("/tuitions")]
pub async fn list_tuitions(
    state: web::Data<AppState>,
    query: web::Query<TuitionQuery>,
) -> Result<HttpResponse> {
    let mut query = query.into_inner();
    query.status = Some(TuitionStatus::Approved);

    let page = state.db.run(move |conn| TuitionPost::list(conn, &query)).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": page.data,
        "total": page.total,
        "currentPage": page.current_page,
        "totalPages": page.total_pages
    })))
}

#[get("/tuitions/mine")]
pub async fn my_tuitions(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
) -> Result<HttpResponse> {
    let posts = state
        .db
        .run(move |conn| TuitionPost::by_student(conn, &student.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tuitions": posts
    })))
}

#[get("/tuitions/{id}")]
pub async fn get_tuition(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let post = state
        .db
        .run(move |conn| TuitionPost::find(conn, &id))
        .await?
        .filter(TuitionPost::is_public)
        .ok_or_else(|| ApiError::not_found("Tuition post not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tuition": post
    })))
}

#[patch("/tuitions/{id}")]
pub async fn update_tuition(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    path: web::Path<String>,
    body: web::Json<TuitionUpdate>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let update = body.into_inner();
    let post = state
        .db
        .run(move |conn| TuitionPost::update(conn, &id, &student.email, update))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tuition": post
    })))
}

#[delete("/tuitions/{id}")]
pub async fn delete_tuition(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let deleted = id.clone();
    state
        .db
        .run(move |conn| TuitionPost::delete(conn, &id, &student.email))
        .await?;

    info!(id = %deleted, "tuition deleted");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Tuition post {} deleted successfully", deleted)
    })))
}

// Applications on a post, each with the applicant's public profile looked up.
#[get("/tuitions/{id}/applications")]
pub async fn tuition_applications(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let applications = state
        .db
        .run(move |conn| {
            let post = TuitionPost::get(conn, &id)?;
            if post.student_email != student.email {
                return Err(ApiError::forbidden(
                    "You can only view applications to your own tuition posts",
                ));
            }

            let mut rows = Vec::new();
            for application in Application::by_tuition(conn, &post.id)? {
                let tutor = User::find(conn, &application.tutor_email)?.map(PublicProfile::from);
                rows.push(json!({
                    "application": application,
                    "tutor": tutor
                }));
            }
            Ok(rows)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "applications": applications
    })))
}
