//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{
            ChangePassword, CreateUser, LoginResponse, Role, UpdateProfile, UpdateUser, User,
            UserClaims, UserQuery, UserShort,
        },
        Page,
    },
    repository::{users::NewUser, Repository},
};

use super::notifications::NotificationsService;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    notifications: NotificationsService,
    hold_days: i64,
}

impl UsersService {
    pub fn new(
        repository: Repository,
        config: AuthConfig,
        notifications: NotificationsService,
        hold_days: i64,
    ) -> Self {
        Self {
            repository,
            config,
            notifications,
            hold_days,
        }
    }

    /// Resolves the login identifier: an email first, then a student child ID
    async fn find_login_user(&self, identifier: &str) -> AppResult<Option<User>> {
        let identifier = identifier.trim();
        if let Some(user) = self.repository.users.get_by_email(identifier).await? {
            return Ok(Some(user));
        }
        match identifier.parse::<i64>() {
            Ok(child_id) => self.repository.users.get_by_child_id(child_id).await,
            Err(_) => Ok(None),
        }
    }

    /// Authenticate by email or child ID and return a JWT
    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<LoginResponse> {
        let user = match self.find_login_user(identifier).await? {
            Some(user) => user,
            None => {
                tracing::info!("Login failed: unknown identifier");
                return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !user.is_active || !verify_password(password, &user.password)? {
            tracing::info!(user_id = user.id, "Login failed: inactive account or wrong password");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.create_token(&user)?;
        tracing::info!(user_id = user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_hours as i64 * 3600,
            user,
        })
    }

    fn create_token(&self, user: &User) -> AppResult<String> {
        UserClaims::new(user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Update own profile. Only admins and librarians may move themselves
    /// to another centre.
    pub async fn update_profile(
        &self,
        user_id: i32,
        role: Role,
        profile: UpdateProfile,
    ) -> AppResult<User> {
        if let Some(ref email) = profile.email {
            if self.repository.users.email_exists(email, Some(user_id)).await? {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }

        let allow_centre = role.can_manage_collection();
        if profile.centre_id.is_some() && !allow_centre {
            return Err(AppError::Authorization(
                "Only admins and librarians can change their centre".to_string(),
            ));
        }
        if let Some(centre_id) = profile.centre_id {
            self.repository.organisation.get_centre(centre_id).await?;
        }

        self.repository
            .users
            .update_profile(user_id, &profile, allow_centre)
            .await
    }

    pub async fn change_password(&self, user_id: i32, request: ChangePassword) -> AppResult<()> {
        let user = self.repository.users.get_by_id(user_id).await?;

        if !verify_password(&request.current_password, &user.password)? {
            return Err(AppError::Authentication("Current password is incorrect".to_string()));
        }

        let hash = hash_password(&request.new_password)?;
        self.repository.users.update_password(user_id, &hash).await?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    pub async fn search_users(&self, query: &UserQuery, page: Page) -> AppResult<(Vec<UserShort>, i64)> {
        self.repository.users.search(query, page).await
    }

    async fn ensure_centre(&self, centre_id: Option<i32>) -> AppResult<()> {
        if let Some(centre_id) = centre_id {
            self.repository.organisation.get_centre(centre_id).await?;
        }
        Ok(())
    }

    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }
        self.ensure_centre(user.centre_id).await?;

        let created = self
            .repository
            .users
            .create(&NewUser {
                email: user.email.trim().to_string(),
                password_hash: hash_password(&user.password)?,
                first_name: user.first_name,
                last_name: user.last_name,
                role: user.role,
                centre_id: user.centre_id,
                force_password_change: false,
            })
            .await?;
        tracing::info!(user_id = created.id, role = %created.role, "User created");
        Ok(created)
    }

    pub async fn update_user(&self, id: i32, user: UpdateUser) -> AppResult<User> {
        self.repository.users.get_by_id(id).await?;

        if let Some(ref email) = user.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }
        self.ensure_centre(user.centre_id).await?;

        let password = match user.password {
            Some(ref password) => Some(hash_password(password)?),
            None => None,
        };

        self.repository.users.update(id, &user, password).await
    }

    /// Delete a user. Active borrows block the deletion unless `force`;
    /// the copies a forced delete releases become available again.
    pub async fn delete_user(&self, id: i32, force: bool) -> AppResult<()> {
        self.repository.users.get_by_id(id).await?;

        let active = self.repository.borrows.count_active(id).await?;
        if active > 0 && !force {
            return Err(AppError::Conflict(format!(
                "User has {} active borrow(s); use force=true to delete anyway",
                active
            )));
        }

        let restocked = self.repository.users.delete(id).await?;
        tracing::info!(user_id = id, force, restocked = restocked.len(), "User deleted");

        for (book, reservation) in restocked {
            if let Some(reservation) = reservation {
                self.notifications
                    .announce_available(&book, &reservation, self.hold_days)
                    .await;
            }
        }
        Ok(())
    }

    /// Creates the configured administrator when no admin exists yet
    pub async fn bootstrap_admin(&self) -> AppResult<()> {
        let (Some(email), Some(password)) = (
            self.config.bootstrap_admin_email.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.users.admin_exists().await? {
            return Ok(());
        }

        let admin = self
            .repository
            .users
            .create(&NewUser {
                email: email.to_string(),
                password_hash: hash_password(password)?,
                first_name: "Administrator".to_string(),
                last_name: String::new(),
                role: Role::Admin,
                centre_id: None,
                force_password_change: true,
            })
            .await?;
        tracing::info!(user_id = admin.id, "Bootstrap administrator created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "plaintext").is_err());
    }
}
