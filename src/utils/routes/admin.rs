use actix_web::{delete, get, patch, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::data::applications::Application;
use crate::data::database::normalize;
use crate::data::listing::PageRequest;
use crate::data::notifications::{deliver, Notice};
use crate::data::payments::Payment;
use crate::data::role_requests::RoleRequest;
use crate::data::tuitions::{TuitionPost, TuitionQuery};
use crate::data::users::{User, UserQuery};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::utils::enums::{RequestStatus, Role, TuitionStatus};
use crate::utils::gate::AdminCaller;

#[derive(Debug, Default, Deserialize)]
pub struct AdminUserQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter<S> {
    pub status: Option<S>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody<S> {
    pub status: S,
}

#[get("/admin/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    _admin: AdminCaller,
    query: web::Query<AdminUserQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let page = PageRequest::new(query.page, query.limit);
    let filter = UserQuery {
        search: query.search,
        role: query.role,
        ..UserQuery::default()
    };
    let users = state.db.run(move |conn| User::list(conn, &filter, page)).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": users.data,
        "total": users.total,
        "currentPage": users.current_page,
        "totalPages": users.total_pages
    })))
}

#[patch("/admin/users/{email}/role")]
pub async fn change_role(
    state: web::Data<AppState>,
    AdminCaller(admin): AdminCaller,
    path: web::Path<String>,
    body: web::Json<RoleBody>,
) -> Result<HttpResponse> {
    let email = normalize(&path.into_inner());
    if email == admin.email {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }
    let role = body.into_inner().role;

    let target = email.clone();
    let updated = state.db.run(move |conn| User::set_role(conn, &target, role)).await?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }
    info!(admin = %admin.email, user = %email, %role, "role changed");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "email": email,
        "role": role
    })))
}

#[delete("/admin/users/{email}")]
pub async fn delete_user(
    state: web::Data<AppState>,
    AdminCaller(admin): AdminCaller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let email = normalize(&path.into_inner());
    if email == admin.email {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let target = email.clone();
    let deleted = state.db.run(move |conn| User::delete(conn, &target)).await?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }
    info!(admin = %admin.email, user = %email, "user deleted");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User deleted"
    })))
}

#[get("/admin/role-requests")]
pub async fn list_role_requests(
    state: web::Data<AppState>,
    _admin: AdminCaller,
    query: web::Query<StatusFilter<RequestStatus>>,
) -> Result<HttpResponse> {
    let status = query.into_inner().status;
    let requests = state.db.run(move |conn| RoleRequest::list(conn, status)).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "requests": requests
    })))
}

#[patch("/admin/role-requests/{id}")]
pub async fn decide_role_request(
    state: web::Data<AppState>,
    _admin: AdminCaller,
    path: web::Path<String>,
    body: web::Json<StatusBody<RequestStatus>>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let decision = body.into_inner().status;
    let request = state
        .db
        .run(move |conn| RoleRequest::decide(conn, &id, decision))
        .await?;

    let message = match request.status {
        RequestStatus::Approved => format!("Your request to become a {} was approved", request.requested_role),
        _ => format!("Your request to become a {} was rejected", request.requested_role),
    };
    deliver(&state.db, vec![Notice::new(request.email.clone(), "role", message)]).await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "request": request
    })))
}

#[get("/admin/tuitions")]
pub async fn list_all_tuitions(
    state: web::Data<AppState>,
    _admin: AdminCaller,
    query: web::Query<TuitionQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let posts = state.db.run(move |conn| TuitionPost::list(conn, &query)).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": posts.data,
        "total": posts.total,
        "currentPage": posts.current_page,
        "totalPages": posts.total_pages
    })))
}

#[patch("/admin/tuitions/{id}/status")]
pub async fn moderate_tuition(
    state: web::Data<AppState>,
    _admin: AdminCaller,
    path: web::Path<String>,
    body: web::Json<StatusBody<TuitionStatus>>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let status = body.into_inner().status;
    let post = state
        .db
        .run(move |conn| TuitionPost::set_status(conn, &id, status))
        .await?;

    deliver(
        &state.db,
        vec![Notice::new(
            post.student_email.clone(),
            "tuition",
            format!("Your {} tuition post was {}", post.subject, post.status),
        )
        .link(format!("/tuitions/{}", post.id))],
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tuition": post
    })))
}

#[get("/admin/payments")]
pub async fn list_payments(
    state: web::Data<AppState>,
    _admin: AdminCaller,
) -> Result<HttpResponse> {
    let (history, revenue) = state
        .db
        .run(|conn| Ok((Payment::all(conn)?, Payment::total_revenue(conn)?)))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "payments": history,
        "totalRevenue": revenue
    })))
}

#[get("/admin/stats")]
pub async fn stats(
    state: web::Data<AppState>,
    _admin: AdminCaller,
) -> Result<HttpResponse> {
    let body = state
        .db
        .run(|conn| {
            Ok(json!({
                "success": true,
                "users": {
                    "students": User::count_by_role(conn, Role::Student)?,
                    "tutors": User::count_by_role(conn, Role::Tutor)?,
                    "admins": User::count_by_role(conn, Role::Admin)?
                },
                "tuitions": {
                    "pending": TuitionPost::count_by_status(conn, TuitionStatus::Pending)?,
                    "approved": TuitionPost::count_by_status(conn, TuitionStatus::Approved)?,
                    "rejected": TuitionPost::count_by_status(conn, TuitionStatus::Rejected)?,
                    "assigned": TuitionPost::count_by_status(conn, TuitionStatus::Assigned)?
                },
                "applications": Application::count(conn)?,
                "payments": Payment::count(conn)?,
                "totalRevenue": Payment::total_revenue(conn)?
            }))
        })
        .await?;

    Ok(HttpResponse::Ok().json(body))
}
