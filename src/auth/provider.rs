use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::models::{AuthChange, Identity};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please enter both email and password")]
    MissingCredentials,

    #[error("Password must be at least {} characters long", MIN_PASSWORD_LEN)]
    WeakPassword,

    #[error("Email already in use: {0}")]
    EmailInUse(String),

    #[error("Invalid email or password")]
    InvalidCredentials,
}

/// Source of the current identity and of sign-in/sign-out transitions
pub trait AuthProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    /// Stream of transitions from now on
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

struct Account {
    id: String,
    password: String,
}

/// Email/password provider kept entirely in memory, for development and tests
pub struct InMemoryAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<Identity>>,
    changes: broadcast::Sender<AuthChange>,
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            changes,
        }
    }

    /// Creates an account and signs it in
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let (email, password) = normalize(email, password)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            debug!(email = %email, "Rejected weak password");
            return Err(AuthError::WeakPassword);
        }

        let identity = {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&email) {
                warn!(email = %email, "Sign-up for existing account");
                return Err(AuthError::EmailInUse(email));
            }
            let id = Uuid::new_v4().to_string();
            accounts.insert(
                email.clone(),
                Account {
                    id: id.clone(),
                    password,
                },
            );
            Identity::new(id, email)
        };

        info!(user_id = %identity.id, "Account created");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let (email, password) = normalize(email, password)?;

        let identity = {
            let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            match accounts.get(&email) {
                Some(account) if account.password == password => {
                    Identity::new(account.id.clone(), email.clone())
                }
                _ => {
                    debug!(email = %email, "Sign-in rejected");
                    return Err(AuthError::InvalidCredentials);
                }
            }
        };

        info!(user_id = %identity.id, "Signed in");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        let was_signed_in = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();

        if was_signed_in {
            info!("Signed out");
            self.set_current(None);
        } else {
            debug!("Sign-out with nobody signed in");
        }
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = identity.clone();

        let change = match identity {
            Some(identity) => AuthChange::SignedIn(identity),
            None => AuthChange::SignedOut,
        };
        if self.changes.send(change).is_err() {
            debug!("Auth change emitted with no receivers");
        }
    }
}

impl AuthProvider for InMemoryAuthProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

fn normalize(email: &str, password: &str) -> Result<(String, String), AuthError> {
    let email = email.trim().to_lowercase();
    let password = password.trim().to_string();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok((email, password))
}
