use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::{new_id, normalize, now};
use crate::data::users::User;
use crate::error::{ApiError, Result};
use crate::utils::enums::{RequestStatus, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub id: String,
    pub email: String,
    pub requested_role: Role,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub status: RequestStatus,
    pub created_at: String,
    pub decided_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoleRequest {
    #[serde(default = "default_requested_role")]
    pub requested_role: Role,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
}

fn default_requested_role() -> Role {
    Role::Tutor
}

impl RoleRequest {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<RoleRequest> {
        Ok(RoleRequest {
            id: row.get("id")?,
            email: row.get("email")?,
            requested_role: row.get("requested_role")?,
            qualifications: row.get("qualifications")?,
            experience: row.get("experience")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            decided_at: row.get("decided_at")?,
        })
    }

    pub fn submit(conn: &Connection, user: &User, new: NewRoleRequest) -> Result<RoleRequest> {
        if new.requested_role == Role::Admin {
            return Err(ApiError::bad_request("The admin role cannot be requested"));
        }
        if user.role == new.requested_role {
            return Err(ApiError::bad_request(format!(
                "You already have the {} role",
                new.requested_role
            )));
        }

        let pending: Option<String> = conn
            .query_row(
                "SELECT id FROM role_requests WHERE email = ?1 AND status = 'pending'",
                [&user.email],
                |row| row.get(0),
            )
            .optional()?;
        if pending.is_some() {
            return Err(ApiError::conflict("You already have a pending role request"));
        }

        let request = RoleRequest {
            id: new_id(),
            email: user.email.clone(),
            requested_role: new.requested_role,
            qualifications: new.qualifications,
            experience: new.experience,
            status: RequestStatus::Pending,
            created_at: now(),
            decided_at: None,
        };
        conn.execute(
            "INSERT INTO role_requests (id, email, requested_role, qualifications, experience,
                status, created_at, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                request.id,
                request.email,
                request.requested_role,
                request.qualifications,
                request.experience,
                request.status,
                request.created_at,
                request.decided_at
            ],
        )
        .map_err(|e| ApiError::from_insert(e, "You already have a pending role request"))?;
        Ok(request)
    }

    pub fn by_email(conn: &Connection, email: &str) -> Result<Vec<RoleRequest>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM role_requests WHERE email = ?1 ORDER BY created_at DESC",
        )?;
        let requests = stmt
            .query_map([normalize(email)], RoleRequest::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requests)
    }

    pub fn list(conn: &Connection, status: Option<RequestStatus>) -> Result<Vec<RoleRequest>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM role_requests WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC",
        )?;
        let requests = stmt
            .query_map([status], RoleRequest::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requests)
    }

    /// Approving promotes the requester; both outcomes close the request.
    pub fn decide(conn: &mut Connection, id: &str, decision: RequestStatus) -> Result<RoleRequest> {
        if decision == RequestStatus::Pending {
            return Err(ApiError::bad_request("Status must be either 'approved' or 'rejected'"));
        }

        let tx = conn.transaction()?;
        let mut request = tx
            .query_row("SELECT * FROM role_requests WHERE id = ?1", [id], RoleRequest::from_row)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Role request not found"))?;
        if request.status != RequestStatus::Pending {
            return Err(ApiError::conflict("This role request has already been decided"));
        }

        request.status = decision;
        request.decided_at = Some(now());
        tx.execute(
            "UPDATE role_requests SET status = ?1, decided_at = ?2 WHERE id = ?3",
            params![request.status, request.decided_at, request.id],
        )?;
        if decision == RequestStatus::Approved && !User::set_role(&tx, &request.email, request.requested_role)? {
            return Err(ApiError::not_found("The requesting user no longer exists"));
        }
        tx.commit()?;
        Ok(request)
    }
}
