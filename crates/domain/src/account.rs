//! User accounts, password hashing and role checks.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use common::UserId;
use store::{NewUser, StoreError, User, UserStore};

use crate::error::{DomainError, Result};
use crate::limits::{MAX_NAME_LEN, check_length};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CUSTOMER: &str = "customer";

/// Service for registering and authenticating users.
#[derive(Clone)]
pub struct UserService<S> {
    store: S,
}

impl<S: UserStore> UserService<S> {
    /// Creates a user service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Makes sure the built-in roles exist.
    pub async fn ensure_roles(&self) -> Result<()> {
        for role in [ROLE_ADMIN, ROLE_CUSTOMER] {
            self.store
                .ensure_role(role)
                .await
                .map_err(|e| DomainError::from_store("ensure_role", e))?;
        }
        Ok(())
    }

    /// Registers a customer account.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<User> {
        self.create(email, password, vec![ROLE_CUSTOMER.to_string()])
            .await
    }

    /// Returns the account if `password` matches, otherwise
    /// [`DomainError::InvalidCredentials`].
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(|e| DomainError::from_store("find_user_by_email", e))?
            .ok_or(DomainError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(DomainError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Looks up an account by id. `None` when no such user exists.
    pub async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.store
            .find_user(id)
            .await
            .map_err(|e| DomainError::from_store("find_user", e))
    }

    /// Returns true if the user exists and holds `role`.
    pub async fn has_role(&self, id: UserId, role: &str) -> Result<bool> {
        Ok(self
            .find_user(id)
            .await?
            .is_some_and(|user| user.has_role(role)))
    }

    /// Creates the administrator account unless it already exists.
    #[tracing::instrument(skip(self, password))]
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User> {
        self.ensure_roles().await?;

        let existing = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await
            .map_err(|e| DomainError::from_store("find_user_by_email", e))?;
        if let Some(user) = existing {
            return Ok(user);
        }

        let user = self
            .create(
                email,
                password,
                vec![ROLE_ADMIN.to_string(), ROLE_CUSTOMER.to_string()],
            )
            .await?;
        tracing::info!(user_id = %user.id, "admin account created");
        Ok(user)
    }

    async fn create(&self, email: &str, password: &str, roles: Vec<String>) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("a valid email is required"));
        }
        check_length("email", &email, MAX_NAME_LEN)?;
        if password.is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        let password_hash = hash_password(password)?;
        self.store
            .create_user(NewUser {
                email,
                password_hash,
                roles,
            })
            .await
            .map_err(|e| match e {
                StoreError::UnknownRole(role) => {
                    DomainError::validation(format!("unknown role '{role}'"))
                }
                other => DomainError::from_store("create_user", other),
            })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::validation(format!("unable to hash password: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
