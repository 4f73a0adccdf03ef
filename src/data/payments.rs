use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::normalize;
use crate::error::{ApiError, Result};
use crate::utils::enums::PaymentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub transaction_id: String,
    pub tuition_id: String,
    pub application_id: String,
    pub student_email: String,
    pub tutor_email: String,
    pub amount: f64,
    pub status: PaymentStatus,
    pub paid_at: String,
}

impl Payment {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
        Ok(Payment {
            id: row.get("id")?,
            transaction_id: row.get("transaction_id")?,
            tuition_id: row.get("tuition_id")?,
            application_id: row.get("application_id")?,
            student_email: row.get("student_email")?,
            tutor_email: row.get("tutor_email")?,
            amount: row.get("amount")?,
            status: row.get("status")?,
            paid_at: row.get("paid_at")?,
        })
    }

    pub fn insert(conn: &Connection, payment: &Payment) -> Result<()> {
        conn.execute(
            "INSERT INTO payments (id, transaction_id, tuition_id, application_id, student_email,
                tutor_email, amount, status, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                payment.id,
                payment.transaction_id,
                payment.tuition_id,
                payment.application_id,
                payment.student_email,
                payment.tutor_email,
                payment.amount,
                payment.status,
                payment.paid_at
            ],
        )
        .map_err(|e| ApiError::from_insert(e, "This payment has already been recorded"))?;
        Ok(())
    }

    pub fn find_by_transaction(conn: &Connection, transaction_id: &str) -> Result<Option<Payment>> {
        let payment = conn
            .query_row(
                "SELECT * FROM payments WHERE transaction_id = ?1",
                [transaction_id],
                Payment::from_row,
            )
            .optional()?;
        Ok(payment)
    }

    fn select(conn: &Connection, sql: &str, email: Option<String>) -> Result<Vec<Payment>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = match email {
            Some(email) => stmt.query_map([email], Payment::from_row)?,
            None => stmt.query_map([], Payment::from_row)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn by_student(conn: &Connection, student_email: &str) -> Result<Vec<Payment>> {
        Payment::select(
            conn,
            "SELECT * FROM payments WHERE student_email = ?1 ORDER BY paid_at DESC",
            Some(normalize(student_email)),
        )
    }

    pub fn by_tutor(conn: &Connection, tutor_email: &str) -> Result<Vec<Payment>> {
        Payment::select(
            conn,
            "SELECT * FROM payments WHERE tutor_email = ?1 ORDER BY paid_at DESC",
            Some(normalize(tutor_email)),
        )
    }

    pub fn all(conn: &Connection) -> Result<Vec<Payment>> {
        Payment::select(conn, "SELECT * FROM payments ORDER BY paid_at DESC", None)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))?)
    }

    pub fn total_revenue(conn: &Connection) -> Result<f64> {
        Ok(conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM payments WHERE status = 'paid'",
            [],
            |row| row.get(0),
        )?)
    }
}

pub fn sum(payments: &[Payment]) -> f64 {
    payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Paid)
        .map(|p| p.amount)
        .sum()
}
