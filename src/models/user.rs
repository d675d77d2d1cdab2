//! User model, roles and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::AppError;

/// User role. A user has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Superuser
    Admin,
    SiteAdmin,
    Librarian,
    Teacher,
    Student,
    Other,
}

text_enum!(Role {
    Admin => "admin",
    SiteAdmin => "site_admin",
    Librarian => "librarian",
    Teacher => "teacher",
    Student => "student",
    Other => "other",
});

impl Role {
    /// Staff manage circulation
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::SiteAdmin | Role::Librarian)
    }

    pub fn is_borrower(&self) -> bool {
        matches!(self, Role::Student | Role::Teacher | Role::Other)
    }

    pub fn can_reserve(&self) -> bool {
        matches!(self, Role::Student | Role::Teacher)
    }

    /// Book and student management
    pub fn can_manage_collection(&self) -> bool {
        matches!(self, Role::Admin | Role::Librarian)
    }

    /// Sees every centre
    pub fn is_global(&self) -> bool {
        matches!(self, Role::Admin | Role::SiteAdmin)
    }
}

/// Which centres a caller may act upon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentreScope {
    All,
    Only(i32),
    /// Staff account without a centre: sees nothing
    Nothing,
}

impl CentreScope {
    pub fn allows(&self, centre_id: Option<i32>) -> bool {
        match self {
            CentreScope::All => true,
            CentreScope::Only(id) => centre_id == Some(*id),
            CentreScope::Nothing => false,
        }
    }

    /// Centre filter for SQL: `None` means no filter
    pub fn filter(&self) -> Option<i32> {
        match self {
            CentreScope::All => None,
            CentreScope::Only(id) => Some(*id),
            // No row has centre_id = -1
            CentreScope::Nothing => Some(-1),
        }
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub centre_id: Option<i32>,
    pub is_active: bool,
    pub force_password_change: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Short user representation for lists and lookups
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserShort {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub centre_id: Option<i32>,
}

/// User query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    /// Matches email, first or last name
    pub search: Option<String>,
    pub role: Option<Role>,
    pub centre_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Login request. `identifier` is an email or a student child ID.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email or Child ID is required"))]
    pub identifier: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Create user request (admin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    pub centre_id: Option<i32>,
}

/// Update user request (admin)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    /// Set to change the centre; use `clear_centre` to unset it
    pub centre_id: Option<i32>,
    #[serde(default)]
    pub clear_centre: bool,
    pub is_active: Option<bool>,
}

/// Update own profile request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Must be unique
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    /// Admin and librarian only
    pub centre_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct DeleteUserQuery {
    /// Delete even when the user still has active borrows
    #[serde(default)]
    pub force: bool,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub centre_id: Option<i32>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, expiration_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            centre_id: user.centre_id,
            exp: (now + chrono::Duration::hours(expiration_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn scope(&self) -> CentreScope {
        if self.role.is_global() {
            CentreScope::All
        } else {
            match self.centre_id {
                Some(id) => CentreScope::Only(id),
                None => CentreScope::Nothing,
            }
        }
    }

    fn deny(&self, message: &str) -> AppError {
        tracing::warn!(user_id = self.user_id, role = %self.role, "{}", message);
        AppError::Authorization(message.to_string())
    }

    // Authorization checks
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(self.deny("Administrator privileges required"))
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(self.deny("Only librarians and administrators can perform this action"))
        }
    }

    pub fn require_manage_collection(&self) -> Result<(), AppError> {
        if self.role.can_manage_collection() {
            Ok(())
        } else {
            Err(self.deny("Only admins and librarians can manage books and students"))
        }
    }

    pub fn require_borrower(&self) -> Result<(), AppError> {
        if self.role.is_borrower() {
            Ok(())
        } else {
            Err(self.deny("Only students, teachers and other staff can borrow books"))
        }
    }

    pub fn require_reserver(&self) -> Result<(), AppError> {
        if self.role.can_reserve() {
            Ok(())
        } else {
            Err(self.deny("Only students and teachers can reserve books"))
        }
    }

    pub fn require_teacher(&self) -> Result<(), AppError> {
        if self.role == Role::Teacher {
            Ok(())
        } else {
            Err(self.deny("Only teachers can perform this action"))
        }
    }

    /// Fails when the record's centre is outside the caller's scope
    pub fn require_centre(&self, centre_id: Option<i32>) -> Result<(), AppError> {
        if self.scope().allows(centre_id) {
            Ok(())
        } else {
            Err(self.deny("You can only manage records in your own centre"))
        }
    }

    /// Users without a centre are visible to every staff member
    pub fn require_user(&self, user: &User) -> Result<(), AppError> {
        if user.centre_id.is_none() {
            return Ok(());
        }
        self.require_centre(user.centre_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, centre_id: Option<i32>) -> UserClaims {
        UserClaims {
            sub: "someone@school.test".into(),
            user_id: 7,
            role,
            centre_id,
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
        }
    }

    #[test]
    fn role_round_trips_as_text() {
        assert_eq!("site_admin".parse::<Role>(), Ok(Role::SiteAdmin));
        assert_eq!(Role::Librarian.to_string(), "librarian");
        assert!("janitor".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::SiteAdmin).unwrap(), "\"site_admin\"");
    }

    #[test]
    fn role_groups() {
        assert!(Role::Librarian.is_staff());
        assert!(!Role::Teacher.is_staff());
        assert!(Role::Other.is_borrower());
        assert!(!Role::Other.can_reserve());
        assert!(Role::Teacher.can_reserve());
        assert!(!Role::SiteAdmin.can_manage_collection());
        assert!(Role::Admin.can_manage_collection());
    }

    #[test]
    fn librarian_is_scoped_to_centre() {
        let librarian = claims(Role::Librarian, Some(3));
        assert_eq!(librarian.scope(), CentreScope::Only(3));
        assert!(librarian.require_centre(Some(3)).is_ok());
        assert!(librarian.require_centre(Some(4)).is_err());
        assert!(librarian.require_centre(None).is_err());

        let admin = claims(Role::Admin, None);
        assert_eq!(admin.scope(), CentreScope::All);
        assert!(admin.require_centre(Some(4)).is_ok());

        let orphan = claims(Role::Librarian, None);
        assert_eq!(orphan.scope(), CentreScope::Nothing);
        assert_eq!(orphan.scope().filter(), Some(-1));
    }

    #[test]
    fn user_records_follow_centre_scope() {
        let user = |centre_id| User {
            id: 9,
            email: "pupil@school.test".into(),
            password: String::new(),
            first_name: "Amina".into(),
            last_name: "Said".into(),
            role: Role::Student,
            centre_id,
            is_active: true,
            force_password_change: false,
            created_at: Utc::now(),
        };
        let librarian = claims(Role::Librarian, Some(3));
        assert!(librarian.require_user(&user(Some(3))).is_ok());
        assert!(librarian.require_user(&user(None)).is_ok());
        assert!(matches!(
            librarian.require_user(&user(Some(4))),
            Err(AppError::Authorization(_))
        ));
        assert!(claims(Role::SiteAdmin, None).require_user(&user(Some(4))).is_ok());
    }

    #[test]
    fn permission_checks() {
        assert!(claims(Role::Student, Some(1)).require_staff().is_err());
        assert!(claims(Role::SiteAdmin, None).require_staff().is_ok());
        assert!(claims(Role::SiteAdmin, None).require_admin().is_err());
        assert!(claims(Role::Librarian, Some(1)).require_borrower().is_err());
        assert!(claims(Role::Other, Some(1)).require_reserver().is_err());
        assert!(claims(Role::Student, Some(1)).require_teacher().is_err());
        assert!(claims(Role::Teacher, Some(1)).require_teacher().is_ok());
    }

    #[test]
    fn token_round_trip() {
        let original = claims(Role::Teacher, Some(2));
        let token = original.create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.user_id, 7);
        assert_eq!(decoded.role, Role::Teacher);
        assert_eq!(decoded.centre_id, Some(2));
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn change_password_must_match() {
        let request = ChangePassword {
            current_password: "old".into(),
            new_password: "longenough".into(),
            confirm_password: "different1".into(),
        };
        assert!(request.validate().is_err());
    }
}
