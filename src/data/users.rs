use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::{json_column, normalize, now};
use crate::data::listing::{fetch_page, Filter, Page, PageRequest};
use crate::error::Result;
use crate::utils::enums::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    pub photo: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub subjects: Vec<String>,
    pub qualifications: Option<String>,
    pub experience_years: i64,
    pub created_at: String,
    pub last_login_at: String,
}

/// What other users get to see of someone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub email: String,
    pub name: String,
    pub photo: Option<String>,
    pub role: Role,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub subjects: Vec<String>,
    pub qualifications: Option<String>,
    pub experience_years: i64,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        PublicProfile {
            email: user.email,
            name: user.name,
            photo: user.photo,
            role: user.role,
            bio: user.bio,
            location: user.location,
            subjects: user.subjects,
            qualifications: user.qualifications,
            experience_years: user.experience_years,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub photo: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub qualifications: Option<String>,
    pub experience_years: Option<i64>,
}

#[derive(Debug, Default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub subject: Option<String>,
    pub location: Option<String>,
    pub sort: Option<String>,
}

impl User {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            email: row.get("email")?,
            name: row.get("name")?,
            photo: row.get("photo")?,
            role: row.get("role")?,
            phone: row.get("phone")?,
            bio: row.get("bio")?,
            location: row.get("location")?,
            subjects: json_column(row, "subjects")?,
            qualifications: row.get("qualifications")?,
            experience_years: row.get("experience_years")?,
            created_at: row.get("created_at")?,
            last_login_at: row.get("last_login_at")?,
        })
    }

    fn search_key(&self) -> String {
        let mut parts = vec![self.name.as_str(), self.email.as_str()];
        if let Some(location) = &self.location {
            parts.push(location);
        }
        parts.extend(self.subjects.iter().map(String::as_str));
        normalize(&parts.join(" "))
    }

    pub fn find(conn: &Connection, email: &str) -> Result<Option<User>> {
        let user = conn
            .query_row(
                "SELECT * FROM users WHERE email = ?1",
                [normalize(email)],
                User::from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// First-login upsert. Returns the stored user and whether it was just created.
    pub fn login(
        conn: &Connection,
        email: &str,
        name: Option<String>,
        photo: Option<String>,
    ) -> Result<(User, bool)> {
        let email = normalize(email);
        let timestamp = now();

        if let Some(mut user) = User::find(conn, &email)? {
            conn.execute(
                "UPDATE users SET last_login_at = ?1 WHERE email = ?2",
                params![timestamp, email],
            )?;
            user.last_login_at = timestamp;
            return Ok((user, false));
        }

        let display_name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let user = User {
            email,
            name: display_name.trim().to_string(),
            photo,
            role: Role::Student,
            phone: None,
            bio: None,
            location: None,
            subjects: Vec::new(),
            qualifications: None,
            experience_years: 0,
            created_at: timestamp.clone(),
            last_login_at: timestamp,
        };
        User::insert(conn, &user)?;
        Ok((user, true))
    }

    pub fn insert(conn: &Connection, user: &User) -> Result<()> {
        conn.execute(
            "INSERT INTO users (email, name, photo, role, phone, bio, location, location_key,
                subjects, qualifications, experience_years, search_key, created_at, last_login_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                user.email,
                user.name,
                user.photo,
                user.role,
                user.phone,
                user.bio,
                user.location,
                user.location.as_deref().map(normalize),
                serde_json::to_string(&user.subjects).unwrap_or_else(|_| "[]".to_string()),
                user.qualifications,
                user.experience_years,
                user.search_key(),
                user.created_at,
                user.last_login_at
            ],
        )?;
        Ok(())
    }

    /// Applies the given profile fields. Role is not touched.
    pub fn update_profile(conn: &Connection, email: &str, update: ProfileUpdate) -> Result<Option<User>> {
        let Some(mut user) = User::find(conn, email)? else {
            return Ok(None);
        };

        if let Some(name) = update.name.filter(|n| !n.trim().is_empty()) {
            user.name = name.trim().to_string();
        }
        if update.photo.is_some() {
            user.photo = update.photo;
        }
        if update.phone.is_some() {
            user.phone = update.phone;
        }
        if update.bio.is_some() {
            user.bio = update.bio;
        }
        if update.location.is_some() {
            user.location = update.location;
        }
        if let Some(subjects) = update.subjects {
            user.subjects = subjects
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if update.qualifications.is_some() {
            user.qualifications = update.qualifications;
        }
        if let Some(years) = update.experience_years {
            user.experience_years = years.max(0);
        }

        conn.execute(
            "UPDATE users SET name = ?1, photo = ?2, phone = ?3, bio = ?4, location = ?5,
                location_key = ?6, subjects = ?7, qualifications = ?8, experience_years = ?9,
                search_key = ?10
             WHERE email = ?11",
            params![
                user.name,
                user.photo,
                user.phone,
                user.bio,
                user.location,
                user.location.as_deref().map(normalize),
                serde_json::to_string(&user.subjects).unwrap_or_else(|_| "[]".to_string()),
                user.qualifications,
                user.experience_years,
                user.search_key(),
                user.email
            ],
        )?;
        Ok(Some(user))
    }

    pub fn set_role(conn: &Connection, email: &str, role: Role) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE users SET role = ?1 WHERE email = ?2",
            params![role, normalize(email)],
        )?;
        Ok(updated > 0)
    }

    pub fn delete(conn: &Connection, email: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM users WHERE email = ?1", [normalize(email)])?;
        Ok(deleted > 0)
    }

    pub fn list(conn: &Connection, query: &UserQuery, page: PageRequest) -> Result<Page<User>> {
        let mut filter = Filter::new();
        if let Some(role) = query.role {
            filter.eq("role", role.as_str());
        }
        if let Some(search) = query.search.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            filter.contains("search_key", &search);
        }
        if let Some(location) = query.location.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            filter.eq("location_key", &location);
        }
        if let Some(subject) = query.subject.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            // subjects are stored as a JSON array; match a whole element
            filter.contains("lower(subjects)", &format!("\"{}\"", subject));
        }

        let order_by = match query.sort.as_deref() {
            Some("oldest") => "created_at ASC",
            Some("name") => "name COLLATE NOCASE ASC",
            Some("experience") => "experience_years DESC, created_at DESC",
            _ => "created_at DESC",
        };

        Ok(fetch_page(conn, "users", &filter, order_by, page, User::from_row)?)
    }

    pub fn count_by_role(conn: &Connection, role: Role) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            [role],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::database::Database;

    #[test]
    fn first_login_creates_student_then_reuses() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (user, created) = User::login(conn, "Ana@Example.com", Some("Ana".into()), None)?;
            assert!(created);
            assert_eq!(user.email, "ana@example.com");
            assert_eq!(user.role, Role::Student);

            let (again, created) = User::login(conn, "ana@example.com", Some("Other".into()), None)?;
            assert!(!created);
            assert_eq!(again.name, "Ana");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn tutor_listing_filters_by_subject_and_search() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            for (email, name, subjects) in [
                ("t1@x.com", "Rahim", vec!["Physics", "Math"]),
                ("t2@x.com", "Karim", vec!["Chemistry"]),
            ] {
                User::login(conn, email, Some(name.into()), None)?;
                User::set_role(conn, email, Role::Tutor)?;
                User::update_profile(
                    conn,
                    email,
                    ProfileUpdate {
                        subjects: Some(subjects.into_iter().map(String::from).collect()),
                        location: Some("Dhaka".into()),
                        ..Default::default()
                    },
                )?;
            }
            User::login(conn, "s@x.com", Some("Student".into()), None)?;

            let tutors = UserQuery {
                role: Some(Role::Tutor),
                subject: Some("physics".into()),
                ..Default::default()
            };
            let page = User::list(conn, &tutors, PageRequest::new(None, None))?;
            assert_eq!(page.total, 1);
            assert_eq!(page.data[0].email, "t1@x.com");

            let search = UserQuery {
                role: Some(Role::Tutor),
                search: Some("KAR".into()),
                ..Default::default()
            };
            let page = User::list(conn, &search, PageRequest::new(None, None))?;
            assert_eq!(page.data.len(), 1);
            assert_eq!(page.data[0].name, "Karim");

            let by_location = UserQuery {
                role: Some(Role::Tutor),
                location: Some(" dhaka".into()),
                sort: Some("name".into()),
                ..Default::default()
            };
            let page = User::list(conn, &by_location, PageRequest::new(None, None))?;
            assert_eq!(page.total, 2);
            assert_eq!(page.data[0].name, "Karim");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn profile_update_keeps_role() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            User::login(conn, "a@x.com", None, None)?;
            let user = User::update_profile(
                conn,
                "a@x.com",
                ProfileUpdate {
                    bio: Some("hello".into()),
                    experience_years: Some(-3),
                    ..Default::default()
                },
            )?
            .unwrap();
            assert_eq!(user.bio.as_deref(), Some("hello"));
            assert_eq!(user.experience_years, 0);
            assert_eq!(user.role, Role::Student);
            assert_eq!(user.name, "a");
            Ok(())
        })
        .unwrap();
    }
}
