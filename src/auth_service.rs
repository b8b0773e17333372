use crate::{
    config::SessionConfig,
    errors::{AuthError, StoreError},
    models::{Credential, NewUser, ProfileFields, UserId},
    password,
    repository::RepositoryState,
    session::{SessionState, session_key},
};

/// AuthService
///
/// Owns the credential and session lifecycle: registration, login, token validation with
/// sliding renewal, logout, and password/email changes. Holds no state of its own beyond
/// the injected stores, so it is cloned freely into every request.
#[derive(Clone)]
pub struct AuthService {
    repo: RepositoryState,
    sessions: SessionState,
    config: SessionConfig,
}

impl AuthService {
    pub fn new(repo: RepositoryState, sessions: SessionState, config: SessionConfig) -> Self {
        Self {
            repo,
            sessions,
            config,
        }
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// register
    ///
    /// Creates the credential and profile, then opens a first session for it.
    ///
    /// Both username and email must be unused. The existence checks and the insert are
    /// separate store calls. Two concurrent registrations can both pass the checks; the
    /// loser is rejected by a unique constraint and still surfaces as `DuplicateIdentity`.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        profile: ProfileFields,
    ) -> Result<(UserId, String), AuthError> {
        if self.repo.username_exists(username).await? || self.repo.email_exists(email).await? {
            return Err(AuthError::DuplicateIdentity);
        }

        let password_hash = hash_blocking(password.to_string()).await?;

        let user_id = self
            .repo
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                profile,
            })
            .await?;

        let token = self.issue_session(user_id).await?;
        tracing::info!(user_id, "user registered");
        Ok((user_id, token))
    }

    /// login
    ///
    /// Opens an additional session; sessions already open for the same user are untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let credential = match self.repo.get_credential_by_username(username).await {
            Ok(c) => c,
            Err(StoreError::NoRows) => {
                // Pay the same Argon2 cost as a wrong password.
                verify_blocking(password.to_string(), password::DUMMY_HASH.to_string()).await?;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_blocking(password.to_string(), credential.password_hash).await? {
            tracing::debug!(user_id = credential.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_session(credential.id).await?;
        tracing::info!(user_id = credential.id, "user logged in");
        Ok(token)
    }

    /// validate_token
    ///
    /// Resolves a token to its identity. Every successful call applies sliding renewal:
    /// when less than `renew_threshold` remains, the session gets a fresh `ttl`. Otherwise
    /// the expiration is left alone, so most validations cost no store write.
    pub async fn validate_token(&self, token: &str) -> Result<UserId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        let key = session_key(token);

        let user_id = self
            .sessions
            .get(&key)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        // The key can lapse between GET and TTL; treat that the same as a miss.
        let remaining = self
            .sessions
            .ttl(&key)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if remaining < self.config.renew_threshold {
            if !self.sessions.expire(&key, self.config.ttl).await? {
                return Err(AuthError::InvalidOrExpiredToken);
            }
            tracing::debug!(user_id, remaining_secs = remaining.as_secs(), "session renewed");
        }

        Ok(user_id)
    }

    /// logout
    ///
    /// Idempotent: an unknown or already-removed token is not an error.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete(&session_key(token)).await?;
        Ok(())
    }

    /// change_password
    ///
    /// Requires the current password. Open sessions stay valid.
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.verify_current_password(user_id, old_password).await?;

        let new_hash = hash_blocking(new_password.to_string()).await?;
        match self.repo.update_password_hash(user_id, &new_hash).await {
            Ok(()) => {}
            Err(StoreError::NoRows) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id, "password changed");
        Ok(())
    }

    /// change_email
    ///
    /// Same verification contract as `change_password`. The new email must not belong to
    /// another account; re-submitting the current one is a no-op.
    pub async fn change_email(&self, user_id: UserId, password: &str, new_email: &str) -> Result<(), AuthError> {
        let credential = self.verify_current_password(user_id, password).await?;
        if credential.email == new_email {
            return Ok(());
        }
        if self.repo.email_exists(new_email).await? {
            return Err(AuthError::DuplicateIdentity);
        }

        match self.repo.update_email(user_id, new_email).await {
            Ok(()) => {}
            Err(StoreError::NoRows) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id, "email changed");
        Ok(())
    }

    async fn verify_current_password(&self, user_id: UserId, password: &str) -> Result<Credential, AuthError> {
        let credential = match self.repo.get_credential(user_id).await {
            Ok(c) => c,
            Err(StoreError::NoRows) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !verify_blocking(password.to_string(), credential.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(credential)
    }

    async fn issue_session(&self, user_id: UserId) -> Result<String, AuthError> {
        let token = password::generate_session_token();
        self.sessions
            .set(&session_key(&token), user_id, self.config.ttl)
            .await?;
        Ok(token)
    }
}

// Argon2 is CPU-bound; keep it off the async worker threads.

async fn hash_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal {
            operation: format!("spawn password verification task: {e}"),
        })
}
