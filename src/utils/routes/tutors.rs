use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::data::listing::PageRequest;
use crate::data::reviews::Review;
use crate::data::users::{PublicProfile, User, UserQuery};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::utils::enums::Role;

#[derive(Debug, Default, Deserialize)]
pub struct TutorListQuery {
    pub search: Option<String>,
    pub subject: Option<String>,
    pub location: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[get("/tutors")]
pub async fn list_tutors(
    state: web::Data<AppState>,
    query: web::Query<TutorListQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let page = PageRequest::new(query.page, query.limit);
    let filter = UserQuery {
        search: query.search,
        role: Some(Role::Tutor),
        subject: query.subject,
        location: query.location,
        sort: query.sort,
    };

    let tutors = state.db.run(move |conn| User::list(conn, &filter, page)).await?;
    let profiles: Vec<PublicProfile> = tutors.data.into_iter().map(PublicProfile::from).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": profiles,
        "total": tutors.total,
        "currentPage": tutors.current_page,
        "totalPages": tutors.total_pages
    })))
}

#[get("/tutors/{email}")]
pub async fn get_tutor(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let email = path.into_inner();
    let (tutor, summary) = state
        .db
        .run(move |conn| {
            let tutor = User::find(conn, &email)?
                .filter(|u| u.role == Role::Tutor)
                .ok_or_else(|| ApiError::not_found("Tutor not found"))?;
            let summary = Review::summary_for(conn, &tutor.email)?;
            Ok((tutor, summary))
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tutor": PublicProfile::from(tutor),
        "averageRating": summary.average_rating,
        "reviewCount": summary.review_count
    })))
}

#[get("/tutors/{email}/reviews")]
pub async fn tutor_reviews(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let email = path.into_inner();
    let (reviews, summary) = state
        .db
        .run(move |conn| {
            let reviews = Review::for_tutor(conn, &email)?;
            let summary = Review::summary_for(conn, &email)?;
            Ok((reviews, summary))
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reviews": reviews,
        "averageRating": summary.average_rating,
        "reviewCount": summary.review_count
    })))
}
