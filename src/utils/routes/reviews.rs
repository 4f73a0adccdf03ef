use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::data::notifications::{deliver, Notice};
use crate::data::reviews::{NewReview, Review};
use crate::error::Result;
use crate::state::AppState;
use crate::utils::gate::StudentCaller;

#[post("/reviews")]
pub async fn create_review(
    state: web::Data<AppState>,
    StudentCaller(student): StudentCaller,
    body: web::Json<NewReview>,
) -> Result<HttpResponse> {
    let new = body.into_inner();
    let student_name = student.name.clone();
    let review = state
        .db
        .run(move |conn| Review::submit(conn, &student.email, new))
        .await?;

    deliver(
        &state.db,
        vec![Notice::new(
            review.tutor_email.clone(),
            "review",
            format!("{} left you a {}-star review", student_name, review.rating),
        )],
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "review": review
    })))
}
