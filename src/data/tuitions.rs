use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::{new_id, normalize, now};
use crate::data::listing::{fetch_page, Filter, Page, PageRequest};
use crate::error::{ApiError, Result};
use crate::utils::enums::TuitionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuitionPost {
    pub id: String,
    pub student_email: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_level: String,
    pub location: String,
    pub salary: f64,
    pub days_per_week: Option<i64>,
    pub schedule: Option<String>,
    pub medium: Option<String>,
    pub description: Option<String>,
    pub status: TuitionStatus,
    pub assigned_tutor_email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTuition {
    pub subject: String,
    #[serde(rename = "class")]
    pub class_level: String,
    pub location: String,
    pub salary: f64,
    pub days_per_week: Option<i64>,
    pub schedule: Option<String>,
    pub medium: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuitionUpdate {
    pub subject: Option<String>,
    #[serde(rename = "class")]
    pub class_level: Option<String>,
    pub location: Option<String>,
    pub salary: Option<f64>,
    pub days_per_week: Option<i64>,
    pub schedule: Option<String>,
    pub medium: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuitionQuery {
    pub search: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "class")]
    pub class_level: Option<String>,
    pub location: Option<String>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub sort: Option<String>,
    pub status: Option<TuitionStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

fn require_salary(salary: f64) -> Result<()> {
    if !salary.is_finite() || salary <= 0.0 {
        return Err(ApiError::bad_request("Salary must be greater than zero"));
    }
    Ok(())
}

impl NewTuition {
    pub fn validate(&self) -> Result<()> {
        require_text(&self.subject, "Subject")?;
        require_text(&self.class_level, "Class")?;
        require_text(&self.location, "Location")?;
        require_salary(self.salary)
    }
}

impl TuitionPost {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<TuitionPost> {
        Ok(TuitionPost {
            id: row.get("id")?,
            student_email: row.get("student_email")?,
            subject: row.get("subject")?,
            class_level: row.get("class_level")?,
            location: row.get("location")?,
            salary: row.get("salary")?,
            days_per_week: row.get("days_per_week")?,
            schedule: row.get("schedule")?,
            medium: row.get("medium")?,
            description: row.get("description")?,
            status: row.get("status")?,
            assigned_tutor_email: row.get("assigned_tutor_email")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn search_key(&self) -> String {
        normalize(&format!(
            "{} {} {} {}",
            self.subject,
            self.class_level,
            self.location,
            self.description.as_deref().unwrap_or_default()
        ))
    }

    pub fn is_public(&self) -> bool {
        matches!(self.status, TuitionStatus::Approved | TuitionStatus::Assigned)
    }

    pub fn create(conn: &Connection, student_email: &str, new: NewTuition) -> Result<TuitionPost> {
        new.validate()?;
        let timestamp = now();
        let post = TuitionPost {
            id: new_id(),
            student_email: normalize(student_email),
            subject: new.subject.trim().to_string(),
            class_level: new.class_level.trim().to_string(),
            location: new.location.trim().to_string(),
            salary: new.salary,
            days_per_week: new.days_per_week,
            schedule: new.schedule,
            medium: new.medium,
            description: new.description,
            status: TuitionStatus::Pending,
            assigned_tutor_email: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        conn.execute(
            "INSERT INTO tuitions (id, student_email, subject, subject_key, class_level, class_key,
                location, location_key, salary, days_per_week, schedule, medium, description,
                search_key, status, assigned_tutor_email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                post.id,
                post.student_email,
                post.subject,
                normalize(&post.subject),
                post.class_level,
                normalize(&post.class_level),
                post.location,
                normalize(&post.location),
                post.salary,
                post.days_per_week,
                post.schedule,
                post.medium,
                post.description,
                post.search_key(),
                post.status,
                post.assigned_tutor_email,
                post.created_at,
                post.updated_at
            ],
        )?;
        Ok(post)
    }

    pub fn find(conn: &Connection, id: &str) -> Result<Option<TuitionPost>> {
        let post = conn
            .query_row("SELECT * FROM tuitions WHERE id = ?1", [id], TuitionPost::from_row)
            .optional()?;
        Ok(post)
    }

    pub fn get(conn: &Connection, id: &str) -> Result<TuitionPost> {
        TuitionPost::find(conn, id)?.ok_or_else(|| ApiError::not_found("Tuition post not found"))
    }

    /// Edits a post the caller owns. Assigned posts are frozen.
    pub fn update(
        conn: &Connection,
        id: &str,
        owner_email: &str,
        update: TuitionUpdate,
    ) -> Result<TuitionPost> {
        let mut post = TuitionPost::get(conn, id)?;
        if post.student_email != normalize(owner_email) {
            return Err(ApiError::forbidden("You can only edit your own tuition posts"));
        }
        if post.status == TuitionStatus::Assigned {
            return Err(ApiError::conflict("An assigned tuition post can no longer be edited"));
        }

        if let Some(subject) = update.subject {
            require_text(&subject, "Subject")?;
            post.subject = subject.trim().to_string();
        }
        if let Some(class_level) = update.class_level {
            require_text(&class_level, "Class")?;
            post.class_level = class_level.trim().to_string();
        }
        if let Some(location) = update.location {
            require_text(&location, "Location")?;
            post.location = location.trim().to_string();
        }
        if let Some(salary) = update.salary {
            require_salary(salary)?;
            post.salary = salary;
        }
        if update.days_per_week.is_some() {
            post.days_per_week = update.days_per_week;
        }
        if update.schedule.is_some() {
            post.schedule = update.schedule;
        }
        if update.medium.is_some() {
            post.medium = update.medium;
        }
        if update.description.is_some() {
            post.description = update.description;
        }
        post.updated_at = now();

        conn.execute(
            "UPDATE tuitions SET subject = ?1, subject_key = ?2, class_level = ?3, class_key = ?4,
                location = ?5, location_key = ?6, salary = ?7, days_per_week = ?8, schedule = ?9,
                medium = ?10, description = ?11, search_key = ?12, updated_at = ?13
             WHERE id = ?14",
            params![
                post.subject,
                normalize(&post.subject),
                post.class_level,
                normalize(&post.class_level),
                post.location,
                normalize(&post.location),
                post.salary,
                post.days_per_week,
                post.schedule,
                post.medium,
                post.description,
                post.search_key(),
                post.updated_at,
                post.id
            ],
        )?;
        Ok(post)
    }

    /// Deletes a post together with its applications and bookmarks.
    pub fn delete(conn: &mut Connection, id: &str, owner_email: &str) -> Result<()> {
        let post = TuitionPost::get(conn, id)?;
        if post.student_email != normalize(owner_email) {
            return Err(ApiError::forbidden("You can only delete your own tuition posts"));
        }
        if post.status == TuitionStatus::Assigned {
            return Err(ApiError::conflict("An assigned tuition post cannot be deleted"));
        }

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM applications WHERE tuition_id = ?1", [id])?;
        tx.execute(
            "DELETE FROM bookmarks WHERE target_type = 'tuition' AND target_id = ?1",
            [id],
        )?;
        tx.execute("DELETE FROM tuitions WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(())
    }

    /// Admin moderation. Only approved/rejected are accepted and assigned posts are final.
    pub fn set_status(conn: &Connection, id: &str, status: TuitionStatus) -> Result<TuitionPost> {
        if !matches!(status, TuitionStatus::Approved | TuitionStatus::Rejected) {
            return Err(ApiError::bad_request("Status must be either 'approved' or 'rejected'"));
        }
        let mut post = TuitionPost::get(conn, id)?;
        if post.status == TuitionStatus::Assigned {
            return Err(ApiError::conflict("Tuition post is already assigned"));
        }

        post.status = status;
        post.updated_at = now();
        conn.execute(
            "UPDATE tuitions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![post.status, post.updated_at, post.id],
        )?;
        Ok(post)
    }

    pub fn list(conn: &Connection, query: &TuitionQuery) -> Result<Page<TuitionPost>> {
        let mut filter = Filter::new();
        if let Some(status) = query.status {
            filter.eq("status", status.as_str());
        }
        if let Some(search) = query.search.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            filter.contains("search_key", &search);
        }
        if let Some(subject) = query.subject.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            filter.eq("subject_key", &subject);
        }
        if let Some(class) = query.class_level.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            filter.eq("class_key", &class);
        }
        if let Some(location) = query.location.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            filter.eq("location_key", &location);
        }
        if let Some(min) = query.min_salary {
            filter.at_least("salary", min);
        }
        if let Some(max) = query.max_salary {
            filter.at_most("salary", max);
        }

        let order_by = match query.sort.as_deref() {
            Some("oldest") => "created_at ASC",
            Some("salaryHigh") | Some("salary_high") => "salary DESC, created_at DESC",
            Some("salaryLow") | Some("salary_low") => "salary ASC, created_at DESC",
            _ => "created_at DESC",
        };

        let page = PageRequest::new(query.page, query.limit);
        Ok(fetch_page(conn, "tuitions", &filter, order_by, page, TuitionPost::from_row)?)
    }

    pub fn by_student(conn: &Connection, student_email: &str) -> Result<Vec<TuitionPost>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM tuitions WHERE student_email = ?1 ORDER BY created_at DESC",
        )?;
        let posts = stmt
            .query_map([normalize(student_email)], TuitionPost::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    pub fn count_by_status(conn: &Connection, status: TuitionStatus) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM tuitions WHERE status = ?1",
            [status],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
