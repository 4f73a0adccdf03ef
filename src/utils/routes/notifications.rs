use actix_web::{delete, get, patch, web, HttpResponse};
use serde_json::json;

use crate::data::notifications::Notification;
use crate::error::Result;
use crate::state::AppState;
use crate::utils::gate::Member;

#[get("/notifications")]
pub async fn list_notifications(
    state: web::Data<AppState>,
    Member(user): Member,
) -> Result<HttpResponse> {
    let notifications = state
        .db
        .run(move |conn| Notification::for_recipient(conn, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "notifications": notifications
    })))
}

#[get("/notifications/unread-count")]
pub async fn unread_count(
    state: web::Data<AppState>,
    Member(user): Member,
) -> Result<HttpResponse> {
    let count = state
        .db
        .run(move |conn| Notification::unread_count(conn, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": count
    })))
}

#[patch("/notifications/read-all")]
pub async fn mark_all_read(
    state: web::Data<AppState>,
    Member(user): Member,
) -> Result<HttpResponse> {
    let updated = state
        .db
        .run(move |conn| Notification::mark_all_read(conn, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "updated": updated
    })))
}

#[patch("/notifications/{id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    Member(user): Member,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    state
        .db
        .run(move |conn| Notification::mark_read(conn, &id, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[delete("/notifications/{id}")]
pub async fn delete_notification(
    state: web::Data<AppState>,
    Member(user): Member,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    state
        .db
        .run(move |conn| Notification::delete(conn, &id, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
