use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::{new_id, normalize, now};
use crate::data::users::User;
use crate::error::{ApiError, Result};
use crate::utils::enums::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub student_email: String,
    pub tutor_email: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub tutor_email: String,
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: f64,
    pub review_count: usize,
}

impl RatingSummary {
    /// Mean rating rounded to one decimal; zero when there are no reviews.
    pub fn of(ratings: &[u8]) -> RatingSummary {
        if ratings.is_empty() {
            return RatingSummary {
                average_rating: 0.0,
                review_count: 0,
            };
        }
        let total: f64 = ratings.iter().map(|r| f64::from(*r)).sum();
        let mean = total / ratings.len() as f64;
        RatingSummary {
            average_rating: (mean * 10.0).round() / 10.0,
            review_count: ratings.len(),
        }
    }
}

impl Review {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
        Ok(Review {
            id: row.get("id")?,
            student_email: row.get("student_email")?,
            tutor_email: row.get("tutor_email")?,
            rating: row.get("rating")?,
            comment: row.get("comment")?,
            created_at: row.get("created_at")?,
        })
    }

    /// One review per (student, tutor).
    pub fn submit(conn: &Connection, student_email: &str, new: NewReview) -> Result<Review> {
        let rating = u8::try_from(new.rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| ApiError::bad_request("Rating must be between 1 and 5"))?;

        let tutor = User::find(conn, &new.tutor_email)?
            .filter(|u| u.role == Role::Tutor)
            .ok_or_else(|| ApiError::not_found("Tutor not found"))?;

        let review = Review {
            id: new_id(),
            student_email: normalize(student_email),
            tutor_email: tutor.email,
            rating,
            comment: new.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            created_at: now(),
        };

        conn.execute(
            "INSERT INTO reviews (id, student_email, tutor_email, rating, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                review.id,
                review.student_email,
                review.tutor_email,
                review.rating,
                review.comment,
                review.created_at
            ],
        )
        .map_err(|e| ApiError::from_insert(e, "You have already reviewed this tutor"))?;
        Ok(review)
    }

    pub fn for_tutor(conn: &Connection, tutor_email: &str) -> Result<Vec<Review>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM reviews WHERE tutor_email = ?1 ORDER BY created_at DESC",
        )?;
        let reviews = stmt
            .query_map([normalize(tutor_email)], Review::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    pub fn summary_for(conn: &Connection, tutor_email: &str) -> Result<RatingSummary> {
        let mut stmt = conn.prepare("SELECT rating FROM reviews WHERE tutor_email = ?1")?;
        let ratings = stmt
            .query_map([normalize(tutor_email)], |row| row.get::<_, u8>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(RatingSummary::of(&ratings))
    }
}
