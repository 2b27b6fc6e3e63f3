use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::envelope::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

impl UserRole {
    fn parse(raw: &str) -> Result<Self, ()> {
        match raw {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "guest" => Ok(UserRole::Guest),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Blacklisted,
}

impl UserStatus {
    fn parse(raw: &str) -> Result<Self, ()> {
        match raw {
            "active" => Ok(UserStatus::Active),
            "blacklisted" => Ok(UserStatus::Blacklisted),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    App,
    Wechat,
}

impl Platform {
    fn parse(raw: &str) -> Result<Self, ()> {
        match raw {
            "web" => Ok(Platform::Web),
            "app" => Ok(Platform::App),
            "wechat" => Ok(Platform::Wechat),
            _ => Err(()),
        }
    }
}

/// Caller identity as asserted by the upstream gateway. All four headers are
/// required on authenticated routes; absence is 401, a present-but-invalid
/// value is 400.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub platform: Platform,
}

impl Identity {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("admin role required"))
        }
    }
}

fn required_header(parts: &Parts, name: &'static str) -> Result<String, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::unauthorized(format!("missing {name} header")))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::bad_request(format!("invalid {name} header")))?;
    if value.is_empty() {
        return Err(ApiError::unauthorized(format!("missing {name} header")));
    }
    Ok(value.to_string())
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = required_header(parts, "X-User-ID")?;
        let role_raw = required_header(parts, "X-User-Role")?;
        let status_raw = required_header(parts, "X-User-Status")?;
        let platform_raw = required_header(parts, "X-Platform")?;

        let role = UserRole::parse(&role_raw)
            .map_err(|_| ApiError::bad_request(format!("invalid X-User-Role: {role_raw}")))?;
        let status = UserStatus::parse(&status_raw)
            .map_err(|_| ApiError::bad_request(format!("invalid X-User-Status: {status_raw}")))?;
        let platform = Platform::parse(&platform_raw)
            .map_err(|_| ApiError::bad_request(format!("invalid X-Platform: {platform_raw}")))?;

        Ok(Identity {
            user_id,
            role,
            status,
            platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/posts/1");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn full_header_set_is_accepted() {
        let mut parts = parts_with(&[
            ("X-User-ID", "user-1"),
            ("X-User-Role", "user"),
            ("X-User-Status", "active"),
            ("X-Platform", "web"),
        ]);
        let identity = Identity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.role, UserRole::User);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let mut parts = parts_with(&[
            ("X-User-Role", "user"),
            ("X-User-Status", "active"),
            ("X-Platform", "web"),
        ]);
        let err = Identity::from_request_parts(&mut parts, &())
            .await
            .expect_err("missing user id");
        assert_eq!(err.code(), 40101);
    }

    #[tokio::test]
    async fn invalid_role_is_bad_request() {
        let mut parts = parts_with(&[
            ("X-User-ID", "user-1"),
            ("X-User-Role", "superuser"),
            ("X-User-Status", "active"),
            ("X-Platform", "web"),
        ]);
        let err = Identity::from_request_parts(&mut parts, &())
            .await
            .expect_err("bad role");
        assert_eq!(err.code(), 40001);
    }

    #[test]
    fn admin_gate_rejects_plain_users() {
        let identity = Identity {
            user_id: "user-1".into(),
            role: UserRole::User,
            status: UserStatus::Active,
            platform: Platform::Web,
        };
        assert!(identity.require_admin().is_err());
    }
}
