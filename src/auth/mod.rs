use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    domain::{Owned, User},
    error::{AppError, Result},
};

pub mod session;

use session::{Session, SessionStore};

pub struct AuthService {
    session_store: SessionStore,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        // Session security relies on cryptographically random tokens stored
        // server-side (hashed), not on signed tokens.
        Self {
            session_store: SessionStore::new(pool),
        }
    }

    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    /// Hash a password using Argon2. Used in tests and the seed binary.
    #[allow(dead_code)]
    pub async fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub async fn create_session(&self, user_id: Uuid, duration_hours: i64) -> Result<(Session, String)> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(duration_hours);

        let session = self.session_store
            .create(user_id, &token, expires_at)
            .await?;

        Ok((session, token))
    }

    pub async fn validate_session(&self, token: &str) -> Result<Option<Session>> {
        self.session_store.find_by_token(token).await
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<()> {
        self.session_store.delete_by_token(token).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.session_store.cleanup_expired().await
    }

    pub fn create_session_cookie(&self, token: &str, secure: bool) -> Cookie<'static> {
        Cookie::build(("session", token.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(secure)
            .max_age(cookie::time::Duration::hours(24))
            .build()
    }

    pub fn create_logout_cookie() -> Cookie<'static> {
        Cookie::build(("session", ""))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(cookie::time::Duration::seconds(0))
            .build()
    }
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The one ownership check: compares the entity's owner against the
/// requesting principal, with an admin bypass. Entities expose ownership
/// through `Owned` instead of callers branching on entity type.
pub fn authorize_owner(actor: &User, entity: &impl Owned) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }

    match entity.owner_id() {
        Some(owner_id) if owner_id == actor.id => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;
    use chrono::Utc;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            full_name: "Test User".to_string(),
            phone: None,
            role,
            can_create_garage: false,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Thing {
        owner: Option<Uuid>,
    }

    impl Owned for Thing {
        fn owner_id(&self) -> Option<Uuid> {
            self.owner
        }
    }

    #[test]
    fn owner_passes_others_fail() {
        let owner = user(UserRole::CarOwner);
        let stranger = user(UserRole::CarOwner);
        let thing = Thing { owner: Some(owner.id) };

        assert!(authorize_owner(&owner, &thing).is_ok());
        assert!(authorize_owner(&stranger, &thing).is_err());
    }

    #[test]
    fn admin_bypasses_ownership() {
        let admin = user(UserRole::Admin);
        let thing = Thing { owner: Some(Uuid::new_v4()) };
        assert!(authorize_owner(&admin, &thing).is_ok());

        let unowned = Thing { owner: None };
        assert!(authorize_owner(&admin, &unowned).is_ok());
    }

    #[test]
    fn unowned_entity_rejects_non_admins() {
        let actor = user(UserRole::GarageOwner);
        let unowned = Thing { owner: None };
        assert!(authorize_owner(&actor, &unowned).is_err());
    }
}
