//! Request extractors for authentication and the role gate.
//!
//! Every gated request reads the caller's user document fresh; nothing is cached.

use actix_web::dev::Payload;
use actix_web::http::header::Header;
use actix_web::{web, FromRequest, HttpRequest};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use futures_util::future::LocalBoxFuture;
use tracing::debug;

use crate::data::database::normalize;
use crate::data::users::User;
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::utils::enums::Role;

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("Application state is not configured".to_string()))
}

fn bearer_token(req: &HttpRequest) -> Result<String> {
    let auth = Authorization::<Bearer>::parse(req)
        .map_err(|_| ApiError::unauthorized("Missing or invalid authorization header"))?;
    let token = auth.into_scheme().token().trim().to_string();
    if token.is_empty() {
        return Err(ApiError::unauthorized("Missing or invalid authorization header"));
    }
    Ok(token)
}

/// Compares the stored role with the one a route requires.
pub fn check_role(user: Option<User>, required: Option<Role>) -> Result<User> {
    let user = user.ok_or_else(|| ApiError::forbidden("No account found for this user"))?;
    match required {
        Some(role) if user.role != role => {
            debug!(email = %user.email, have = %user.role, need = %role, "role gate refused");
            Err(ApiError::forbidden(format!("Only {}s can access this resource", role)))
        }
        _ => Ok(user),
    }
}

/// A caller holding a verified identity token. No user document is required.
#[derive(Debug, Clone)]
pub struct Caller {
    pub email: String,
}

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = bearer_token(req);
        Box::pin(async move {
            let state = state?;
            let token = token?;
            let email = state.identity.verify(&token).await?;
            Ok(Caller {
                email: normalize(&email),
            })
        })
    }
}

fn gated(req: &HttpRequest, required: Option<Role>) -> LocalBoxFuture<'static, Result<User>> {
    let state = app_state(req);
    let caller = Caller::from_request(req, &mut Payload::None);
    Box::pin(async move {
        let state = state?;
        let caller = caller.await?;
        let user = state
            .db
            .run(move |conn| User::find(conn, &caller.email))
            .await?;
        check_role(user, required)
    })
}

/// A caller with a stored account, any role.
#[derive(Debug, Clone)]
pub struct Member(pub User);

impl FromRequest for Member {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = gated(req, None);
        Box::pin(async move { Ok(Member(user.await?)) })
    }
}

macro_rules! role_extractor {
    ($name:ident, $role:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub User);

        impl FromRequest for $name {
            type Error = ApiError;
            type Future = LocalBoxFuture<'static, Result<Self>>;

            fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
                let user = gated(req, Some($role));
                Box::pin(async move { Ok($name(user.await?)) })
            }
        }
    };
}

role_extractor!(StudentCaller, Role::Student);
role_extractor!(TutorCaller, Role::Tutor);
role_extractor!(AdminCaller, Role::Admin);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::database::now;

    fn user(role: Role) -> User {
        User {
            email: "u@x.com".into(),
            name: "U".into(),
            photo: None,
            role,
            phone: None,
            bio: None,
            location: None,
            subjects: vec![],
            qualifications: None,
            experience_years: 0,
            created_at: now(),
            last_login_at: now(),
        }
    }

    #[test]
    fn missing_user_is_forbidden() {
        assert!(matches!(check_role(None, None), Err(ApiError::Forbidden(_))));
        assert!(matches!(
            check_role(None, Some(Role::Admin)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn role_mismatch_is_forbidden() {
        assert!(matches!(
            check_role(Some(user(Role::Student)), Some(Role::Tutor)),
            Err(ApiError::Forbidden(_))
        ));
        assert!(check_role(Some(user(Role::Tutor)), Some(Role::Tutor)).is_ok());
        assert!(check_role(Some(user(Role::Admin)), None).is_ok());
    }
}
