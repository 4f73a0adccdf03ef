use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::{new_id, normalize, now};
use crate::data::tuitions::TuitionPost;
use crate::error::{ApiError, Result};
use crate::utils::enums::{ApplicationStatus, TuitionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub tuition_id: String,
    pub tutor_email: String,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub expected_salary: Option<f64>,
    pub message: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub tuition_id: String,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub expected_salary: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub expected_salary: Option<f64>,
    pub message: Option<String>,
}

fn check_expected_salary(salary: Option<f64>) -> Result<()> {
    match salary {
        Some(s) if !s.is_finite() || s <= 0.0 => Err(ApiError::bad_request(
            "Expected salary must be greater than zero",
        )),
        _ => Ok(()),
    }
}

impl Application {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
        Ok(Application {
            id: row.get("id")?,
            tuition_id: row.get("tuition_id")?,
            tutor_email: row.get("tutor_email")?,
            qualifications: row.get("qualifications")?,
            experience: row.get("experience")?,
            expected_salary: row.get("expected_salary")?,
            message: row.get("message")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// A tutor bids on an approved post. One application per (tutor, post).
    pub fn submit(conn: &Connection, tutor_email: &str, new: NewApplication) -> Result<(Application, TuitionPost)> {
        check_expected_salary(new.expected_salary)?;
        let tutor_email = normalize(tutor_email);

        let post = TuitionPost::get(conn, &new.tuition_id)?;
        if post.status != TuitionStatus::Approved {
            return Err(ApiError::bad_request("This tuition post is not open for applications"));
        }
        if post.student_email == tutor_email {
            return Err(ApiError::bad_request("You cannot apply to your own tuition post"));
        }
        if Application::find_for(conn, &tutor_email, &post.id)?.is_some() {
            return Err(ApiError::conflict("You have already applied to this tuition"));
        }

        let timestamp = now();
        let application = Application {
            id: new_id(),
            tuition_id: post.id.clone(),
            tutor_email,
            qualifications: new.qualifications,
            experience: new.experience,
            expected_salary: new.expected_salary,
            message: new.message,
            status: ApplicationStatus::Pending,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        conn.execute(
            "INSERT INTO applications (id, tuition_id, tutor_email, qualifications, experience,
                expected_salary, message, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                application.id,
                application.tuition_id,
                application.tutor_email,
                application.qualifications,
                application.experience,
                application.expected_salary,
                application.message,
                application.status,
                application.created_at,
                application.updated_at
            ],
        )
        .map_err(|e| ApiError::from_insert(e, "You have already applied to this tuition"))?;

        Ok((application, post))
    }

    pub fn find(conn: &Connection, id: &str) -> Result<Option<Application>> {
        let application = conn
            .query_row("SELECT * FROM applications WHERE id = ?1", [id], Application::from_row)
            .optional()?;
        Ok(application)
    }

    pub fn get(conn: &Connection, id: &str) -> Result<Application> {
        Application::find(conn, id)?.ok_or_else(|| ApiError::not_found("Application not found"))
    }

    pub fn find_for(conn: &Connection, tutor_email: &str, tuition_id: &str) -> Result<Option<Application>> {
        let application = conn
            .query_row(
                "SELECT * FROM applications WHERE tutor_email = ?1 AND tuition_id = ?2",
                params![normalize(tutor_email), tuition_id],
                Application::from_row,
            )
            .optional()?;
        Ok(application)
    }

    fn owned_pending(conn: &Connection, id: &str, tutor_email: &str) -> Result<Application> {
        let application = Application::get(conn, id)?;
        if application.tutor_email != normalize(tutor_email) {
            return Err(ApiError::forbidden("You can only manage your own applications"));
        }
        if application.status != ApplicationStatus::Pending {
            return Err(ApiError::conflict("Only pending applications can be changed"));
        }
        Ok(application)
    }

    pub fn update(
        conn: &Connection,
        id: &str,
        tutor_email: &str,
        update: ApplicationUpdate,
    ) -> Result<Application> {
        check_expected_salary(update.expected_salary)?;
        let mut application = Application::owned_pending(conn, id, tutor_email)?;

        if update.qualifications.is_some() {
            application.qualifications = update.qualifications;
        }
        if update.experience.is_some() {
            application.experience = update.experience;
        }
        if update.expected_salary.is_some() {
            application.expected_salary = update.expected_salary;
        }
        if update.message.is_some() {
            application.message = update.message;
        }
        application.updated_at = now();

        conn.execute(
            "UPDATE applications SET qualifications = ?1, experience = ?2, expected_salary = ?3,
                message = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                application.qualifications,
                application.experience,
                application.expected_salary,
                application.message,
                application.updated_at,
                application.id
            ],
        )?;
        Ok(application)
    }

    pub fn withdraw(conn: &Connection, id: &str, tutor_email: &str) -> Result<()> {
        let application = Application::owned_pending(conn, id, tutor_email)?;
        conn.execute("DELETE FROM applications WHERE id = ?1", [application.id])?;
        Ok(())
    }

    /// The student who owns the post turns a pending application down.
    pub fn reject(conn: &Connection, id: &str, student_email: &str) -> Result<Application> {
        let mut application = Application::get(conn, id)?;
        let post = TuitionPost::get(conn, &application.tuition_id)?;
        if post.student_email != normalize(student_email) {
            return Err(ApiError::forbidden(
                "You can only reject applications to your own tuition posts",
            ));
        }
        if application.status != ApplicationStatus::Pending {
            return Err(ApiError::conflict("Only pending applications can be rejected"));
        }

        application.status = ApplicationStatus::Rejected;
        application.updated_at = now();
        conn.execute(
            "UPDATE applications SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![application.status, application.updated_at, application.id],
        )?;
        Ok(application)
    }

    pub fn by_tutor(
        conn: &Connection,
        tutor_email: &str,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM applications
             WHERE tutor_email = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC",
        )?;
        let applications = stmt
            .query_map(params![normalize(tutor_email), status], Application::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(applications)
    }

    pub fn by_tuition(conn: &Connection, tuition_id: &str) -> Result<Vec<Application>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM applications WHERE tuition_id = ?1 ORDER BY created_at ASC",
        )?;
        let applications = stmt
            .query_map([tuition_id], Application::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(applications)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM applications", [], |row| row.get(0))?)
    }
}
