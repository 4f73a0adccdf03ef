use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::{new_id, normalize, now};
use crate::data::tuitions::TuitionPost;
use crate::data::users::User;
use crate::error::{ApiError, Result};
use crate::utils::enums::{BookmarkTarget, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    pub owner_email: String,
    pub target_type: BookmarkTarget,
    pub target_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBookmark {
    pub target_type: BookmarkTarget,
    pub target_id: String,
}

impl Bookmark {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get("id")?,
            owner_email: row.get("owner_email")?,
            target_type: row.get("target_type")?,
            target_id: row.get("target_id")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn add(conn: &Connection, owner_email: &str, new: NewBookmark) -> Result<Bookmark> {
        let target_id = match new.target_type {
            BookmarkTarget::Tuition => {
                TuitionPost::find(conn, new.target_id.trim())?
                    .filter(TuitionPost::is_public)
                    .ok_or_else(|| ApiError::not_found("Tuition post not found"))?
                    .id
            }
            BookmarkTarget::Tutor => {
                User::find(conn, &new.target_id)?
                    .filter(|u| u.role == Role::Tutor)
                    .ok_or_else(|| ApiError::not_found("Tutor not found"))?
                    .email
            }
        };

        let bookmark = Bookmark {
            id: new_id(),
            owner_email: normalize(owner_email),
            target_type: new.target_type,
            target_id,
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO bookmarks (id, owner_email, target_type, target_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                bookmark.id,
                bookmark.owner_email,
                bookmark.target_type,
                bookmark.target_id,
                bookmark.created_at
            ],
        )
        .map_err(|e| ApiError::from_insert(e, "Already bookmarked"))?;
        Ok(bookmark)
    }

    pub fn for_owner(conn: &Connection, owner_email: &str) -> Result<Vec<Bookmark>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM bookmarks WHERE owner_email = ?1 ORDER BY created_at DESC",
        )?;
        let bookmarks = stmt
            .query_map([normalize(owner_email)], Bookmark::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bookmarks)
    }

    pub fn remove(conn: &Connection, id: &str, owner_email: &str) -> Result<()> {
        let deleted = conn.execute(
            "DELETE FROM bookmarks WHERE id = ?1 AND owner_email = ?2",
            params![id, normalize(owner_email)],
        )?;
        if deleted == 0 {
            return Err(ApiError::not_found("Bookmark not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::database::Database;
    use crate::data::tuitions::NewTuition;
    use crate::utils::enums::TuitionStatus;

    #[test]
    fn duplicate_bookmark_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            User::login(conn, "t@x.com", None, None)?;
            User::set_role(conn, "t@x.com", Role::Tutor)?;

            let new = NewBookmark {
                target_type: BookmarkTarget::Tutor,
                target_id: "T@x.com".into(),
            };
            let bookmark = Bookmark::add(conn, "s@x.com", new.clone())?;
            assert_eq!(bookmark.target_id, "t@x.com");
            assert!(matches!(
                Bookmark::add(conn, "s@x.com", new),
                Err(ApiError::Conflict(_))
            ));

            assert!(matches!(
                Bookmark::remove(conn, &bookmark.id, "other@x.com"),
                Err(ApiError::NotFound(_))
            ));
            Bookmark::remove(conn, &bookmark.id, "s@x.com")?;
            assert!(Bookmark::for_owner(conn, "s@x.com")?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn missing_target_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let err = Bookmark::add(
                conn,
                "s@x.com",
                NewBookmark {
                    target_type: BookmarkTarget::Tuition,
                    target_id: "missing".into(),
                },
            )
            .unwrap_err();
            assert!(matches!(err, ApiError::NotFound(_)));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn only_listed_tuitions_can_be_bookmarked() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let conn = &*conn;
            let post = TuitionPost::create(
                conn,
                "owner@x.com",
                NewTuition {
                    subject: "Math".into(),
                    class_level: "8".into(),
                    location: "Mirpur".into(),
                    salary: 3000.0,
                    days_per_week: None,
                    schedule: None,
                    medium: None,
                    description: None,
                },
            )?;
            let bookmark = || {
                Bookmark::add(
                    conn,
                    "s@x.com",
                    NewBookmark {
                        target_type: BookmarkTarget::Tuition,
                        target_id: post.id.clone(),
                    },
                )
            };

            assert!(matches!(bookmark(), Err(ApiError::NotFound(_))));
            TuitionPost::set_status(conn, &post.id, TuitionStatus::Rejected)?;
            assert!(matches!(bookmark(), Err(ApiError::NotFound(_))));

            TuitionPost::set_status(conn, &post.id, TuitionStatus::Approved)?;
            assert_eq!(bookmark()?.target_id, post.id);
            Ok(())
        })
        .unwrap();
    }
}
