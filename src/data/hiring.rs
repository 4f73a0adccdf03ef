//! Accept/settle: a student pays for a tutor's application, which hires the tutor.
//!
//! All writes happen inside one SQLite transaction. The post is assigned with a
//! conditional update, so when two acceptances for the same post race only the
//! first to commit succeeds and the other rolls back with a conflict.

use rusqlite::{params, Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::applications::Application;
use crate::data::database::{new_id, normalize, now};
use crate::data::payments::Payment;
use crate::data::tuitions::TuitionPost;
use crate::error::{ApiError, Result};
use crate::utils::enums::{ApplicationStatus, PaymentStatus, TuitionStatus};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub tuition_id: String,
    pub application_id: String,
    pub tutor_email: String,
    pub amount: f64,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    pub payment: Payment,
    pub tuition: TuitionPost,
    pub application: Application,
    /// Tutors whose pending applications were closed by this hire.
    pub rejected_tutors: Vec<String>,
}

pub fn settle(conn: &mut Connection, student_email: &str, settlement: Settlement) -> Result<SettleOutcome> {
    let student_email = normalize(student_email);
    let tutor_email = normalize(&settlement.tutor_email);
    let transaction_id = settlement.transaction_id.trim().to_string();

    if transaction_id.is_empty() {
        return Err(ApiError::bad_request("Transaction id is required"));
    }
    if !settlement.amount.is_finite() || settlement.amount <= 0.0 {
        return Err(ApiError::bad_request("Amount must be greater than zero"));
    }

    // IMMEDIATE takes the write lock up front so the checks below see what we write.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut tuition = TuitionPost::get(&tx, &settlement.tuition_id)?;
    if tuition.student_email != student_email {
        return Err(ApiError::forbidden("You can only hire tutors for your own tuition posts"));
    }
    if tuition.status == TuitionStatus::Assigned {
        return Err(ApiError::conflict("A tutor has already been assigned to this tuition"));
    }
    if tuition.status != TuitionStatus::Approved {
        return Err(ApiError::bad_request("This tuition post is not approved"));
    }

    let mut application = Application::get(&tx, &settlement.application_id)?;
    if application.tuition_id != tuition.id || application.tutor_email != tutor_email {
        return Err(ApiError::bad_request(
            "Application does not belong to this tuition and tutor",
        ));
    }
    if application.status != ApplicationStatus::Pending {
        return Err(ApiError::conflict("This application is no longer pending"));
    }

    if Payment::find_by_transaction(&tx, &transaction_id)?.is_some() {
        return Err(ApiError::conflict("This payment has already been recorded"));
    }

    let timestamp = now();
    let payment = Payment {
        id: new_id(),
        transaction_id,
        tuition_id: tuition.id.clone(),
        application_id: application.id.clone(),
        student_email: student_email.clone(),
        tutor_email: tutor_email.clone(),
        amount: settlement.amount,
        status: PaymentStatus::Paid,
        paid_at: timestamp.clone(),
    };
    Payment::insert(&tx, &payment)?;

    tx.execute(
        "UPDATE applications SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![ApplicationStatus::Accepted, timestamp, application.id],
    )?;
    application.status = ApplicationStatus::Accepted;
    application.updated_at = timestamp.clone();

    let assigned = tx.execute(
        "UPDATE tuitions SET status = ?1, assigned_tutor_email = ?2, updated_at = ?3
         WHERE id = ?4 AND status != ?1",
        params![TuitionStatus::Assigned, tutor_email, timestamp, tuition.id],
    )?;
    if assigned != 1 {
        return Err(ApiError::conflict("A tutor has already been assigned to this tuition"));
    }
    tuition.status = TuitionStatus::Assigned;
    tuition.assigned_tutor_email = Some(tutor_email.clone());
    tuition.updated_at = timestamp.clone();

    let rejected_tutors = {
        let mut stmt = tx.prepare(
            "SELECT tutor_email FROM applications
             WHERE tuition_id = ?1 AND id != ?2 AND status = ?3",
        )?;
        let rows = stmt.query_map(
            params![tuition.id, application.id, ApplicationStatus::Pending],
            |row| row.get::<_, String>(0),
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    tx.execute(
        "UPDATE applications SET status = ?1, updated_at = ?2
         WHERE tuition_id = ?3 AND id != ?4 AND status != ?1",
        params![ApplicationStatus::Rejected, timestamp, tuition.id, application.id],
    )?;

    tx.commit()?;

    info!(
        tuition = %tuition.id,
        application = %application.id,
        tutor = %tutor_email,
        rejected = rejected_tutors.len(),
        "tutor hired"
    );

    Ok(SettleOutcome {
        payment,
        tuition,
        application,
        rejected_tutors,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::data::applications::NewApplication;
    use crate::data::database::Database;
    use crate::data::tuitions::NewTuition;

    struct Fixture {
        db: Database,
        tuition_id: String,
        applications: Vec<Application>,
    }

    fn fixture(tutors: &[&str]) -> Fixture {
        fixture_in(Database::open_in_memory().unwrap(), tutors)
    }

    fn fixture_in(db: Database, tutors: &[&str]) -> Fixture {
        let (tuition_id, applications) = db
            .with_conn(|conn| {
                let post = TuitionPost::create(
                    conn,
                    "student@x.com",
                    NewTuition {
                        subject: "Physics".into(),
                        class_level: "HSC".into(),
                        location: "Dhaka".into(),
                        salary: 8000.0,
                        days_per_week: Some(4),
                        schedule: None,
                        medium: None,
                        description: None,
                    },
                )?;
                TuitionPost::set_status(conn, &post.id, TuitionStatus::Approved)?;
                let mut applications = Vec::new();
                for tutor in tutors {
                    let (application, _) = Application::submit(
                        conn,
                        tutor,
                        NewApplication {
                            tuition_id: post.id.clone(),
                            qualifications: None,
                            experience: None,
                            expected_salary: Some(7500.0),
                            message: None,
                        },
                    )?;
                    applications.push(application);
                }
                Ok((post.id, applications))
            })
            .unwrap();
        Fixture {
            db,
            tuition_id,
            applications,
        }
    }

    fn settlement(f: &Fixture, index: usize, transaction_id: &str) -> Settlement {
        Settlement {
            tuition_id: f.tuition_id.clone(),
            application_id: f.applications[index].id.clone(),
            tutor_email: f.applications[index].tutor_email.clone(),
            amount: 7500.0,
            transaction_id: transaction_id.to_string(),
        }
    }

    #[test]
    fn accepts_one_and_rejects_the_rest() {
        let f = fixture(&["a@x.com", "b@x.com", "c@x.com"]);
        let outcome = f
            .db
            .with_conn(|conn| settle(conn, "student@x.com", settlement(&f, 1, "txn_1")))
            .unwrap();

        assert_eq!(outcome.tuition.status, TuitionStatus::Assigned);
        assert_eq!(outcome.tuition.assigned_tutor_email.as_deref(), Some("b@x.com"));
        let mut rejected = outcome.rejected_tutors.clone();
        rejected.sort();
        assert_eq!(rejected, vec!["a@x.com".to_string(), "c@x.com".to_string()]);

        f.db.with_conn(|conn| {
            let statuses: Vec<ApplicationStatus> = Application::by_tuition(conn, &f.tuition_id)?
                .into_iter()
                .map(|a| a.status)
                .collect();
            let accepted = statuses.iter().filter(|s| **s == ApplicationStatus::Accepted).count();
            let rejected = statuses.iter().filter(|s| **s == ApplicationStatus::Rejected).count();
            assert_eq!((accepted, rejected), (1, 2));

            let payment = Payment::find_by_transaction(conn, "txn_1")?.unwrap();
            assert_eq!(payment.status, PaymentStatus::Paid);
            assert_eq!(payment.tutor_email, "b@x.com");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn second_acceptance_conflicts_and_writes_nothing() {
        let f = fixture(&["a@x.com", "b@x.com"]);
        f.db.with_conn(|conn| settle(conn, "student@x.com", settlement(&f, 0, "txn_1")))
            .unwrap();

        let err = f
            .db
            .with_conn(|conn| settle(conn, "student@x.com", settlement(&f, 1, "txn_2")))
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        f.db.with_conn(|conn| {
            assert!(Payment::find_by_transaction(conn, "txn_2")?.is_none());
            assert_eq!(Payment::count(conn)?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn racing_acceptances_hire_exactly_one_tutor() {
        let path = std::env::temp_dir().join(format!("hiring-race-{}.db", new_id()));
        let path = path.to_string_lossy().into_owned();
        let open = || Database::open(&path, Duration::from_secs(10)).unwrap();
        let f = fixture_in(open(), &["a@x.com", "b@x.com"]);

        // each contender gets its own connection to the same file
        let barrier = Barrier::new(2);
        let results: Vec<Result<SettleOutcome>> = thread::scope(|scope| {
            let contenders: Vec<_> = (0..2)
                .map(|index| {
                    let db = open();
                    let settlement = settlement(&f, index, &format!("txn_{}", index));
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        db.with_conn(|conn| settle(conn, "student@x.com", settlement))
                    })
                })
                .collect();
            contenders.into_iter().map(|c| c.join().unwrap()).collect()
        });

        let hired: Vec<&SettleOutcome> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(hired.len(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(ApiError::Conflict(_)))));

        f.db.with_conn(|conn| {
            assert_eq!(Payment::count(conn)?, 1);
            let post = TuitionPost::get(conn, &f.tuition_id)?;
            assert_eq!(post.assigned_tutor_email, hired[0].tuition.assigned_tutor_email);
            let accepted = Application::by_tuition(conn, &f.tuition_id)?
                .into_iter()
                .filter(|a| a.status == ApplicationStatus::Accepted)
                .count();
            assert_eq!(accepted, 1);
            Ok(())
        })
        .unwrap();

        drop(f);
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }
    }

    #[test]
    fn reused_transaction_id_conflicts() {
        let f = fixture(&["a@x.com"]);
        f.db.with_conn(|conn| {
            Payment::insert(
                conn,
                &Payment {
                    id: new_id(),
                    transaction_id: "txn_dup".into(),
                    tuition_id: "elsewhere".into(),
                    application_id: "elsewhere".into(),
                    student_email: "student@x.com".into(),
                    tutor_email: "z@x.com".into(),
                    amount: 1.0,
                    status: PaymentStatus::Paid,
                    paid_at: now(),
                },
            )
        })
        .unwrap();

        let err = f
            .db
            .with_conn(|conn| settle(conn, "student@x.com", settlement(&f, 0, "txn_dup")))
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let post = f.db.with_conn(|conn| TuitionPost::get(conn, &f.tuition_id)).unwrap();
        assert_eq!(post.status, TuitionStatus::Approved);
    }

    #[test]
    fn other_students_cannot_hire() {
        let f = fixture(&["a@x.com"]);
        let err = f
            .db
            .with_conn(|conn| settle(conn, "intruder@x.com", settlement(&f, 0, "txn_1")))
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn mismatched_tutor_is_rejected() {
        let f = fixture(&["a@x.com", "b@x.com"]);
        let mut wrong = settlement(&f, 0, "txn_1");
        wrong.tutor_email = "b@x.com".into();
        let err = f
            .db
            .with_conn(|conn| settle(conn, "student@x.com", wrong))
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn missing_tuition_is_not_found() {
        let f = fixture(&["a@x.com"]);
        let mut missing = settlement(&f, 0, "txn_1");
        missing.tuition_id = "nope".into();
        let err = f
            .db
            .with_conn(|conn| settle(conn, "student@x.com", missing))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
