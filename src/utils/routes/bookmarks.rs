use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;

use crate::data::bookmarks::{Bookmark, NewBookmark};
use crate::error::Result;
use crate::state::AppState;
use crate::utils::gate::Member;

#[post("/bookmarks")]
pub async fn add_bookmark(
    state: web::Data<AppState>,
    Member(user): Member,
    body: web::Json<NewBookmark>,
) -> Result<HttpResponse> {
    let new = body.into_inner();
    let bookmark = state
        .db
        .run(move |conn| Bookmark::add(conn, &user.email, new))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "bookmark": bookmark
    })))
}

#[get("/bookmarks")]
pub async fn list_bookmarks(
    state: web::Data<AppState>,
    Member(user): Member,
) -> Result<HttpResponse> {
    let bookmarks = state
        .db
        .run(move |conn| Bookmark::for_owner(conn, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "bookmarks": bookmarks
    })))
}

#[delete("/bookmarks/{id}")]
pub async fn remove_bookmark(
    state: web::Data<AppState>,
    Member(user): Member,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    state
        .db
        .run(move |conn| Bookmark::remove(conn, &id, &user.email))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Bookmark removed"
    })))
}
