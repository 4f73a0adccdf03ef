use actix_web::{get, patch, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::data::role_requests::{NewRoleRequest, RoleRequest};
use crate::data::users::{ProfileUpdate, User};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::utils::gate::{Caller, Member};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub name: Option<String>,
    pub photo: Option<String>,
}

// Called by the client after every sign-in; creates the account on first contact.
#[post("/users")]
pub async fn login_user(
    state: web::Data<AppState>,
    caller: Caller,
    body: Option<web::Json<LoginRequest>>,
) -> Result<HttpResponse> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let email = caller.email;
    let (user, created) = state
        .db
        .run(move |conn| User::login(conn, &email, body.name, body.photo))
        .await?;

    if created {
        info!(email = %user.email, "new account created");
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "created": created,
        "user": user
    })))
}

#[get("/users/me")]
pub async fn get_me(Member(user): Member) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user
    })))
}

#[patch("/users/me")]
pub async fn update_me(
    state: web::Data<AppState>,
    Member(user): Member,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse> {
    let update = body.into_inner();
    let updated = state
        .db
        .run(move |conn| User::update_profile(conn, &user.email, update))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": updated
    })))
}

#[get("/users/{email}/role")]
pub async fn get_role(
    state: web::Data<AppState>,
    _caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let email = path.into_inner();
    let user = state
        .db
        .run(move |conn| User::find(conn, &email))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "role": user.role
    })))
}

#[post("/role-requests")]
pub async fn request_role(
    state: web::Data<AppState>,
    Member(user): Member,
    body: web::Json<NewRoleRequest>,
) -> Result<HttpResponse> {
    let new = body.into_inner();
    let request = state
        .db
        .run(move |conn| RoleRequest::submit(conn, &user, new))
        .await?;

    info!(email = %request.email, role = %request.requested_role, "role requested");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "request": request
    })))
}

#[get("/role-requests/mine")]
pub async fn my_role_requests(
    state: web::Data<AppState>,
    Member(user): Member,
) -> Result<HttpResponse> {
    let requests = state
        .db
        .run(move |conn| RoleRequest::by_email(conn, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "requests": requests
    })))
}
