//! User persistence boundary.
//!
//! Handlers talk to [`UserStore`] only; the in-memory implementation backs
//! the server today and a relational one can slot in behind the same trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use jiff::Timestamp;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::Principal;
use crate::model::{CreateUserRequest, LoginInfoRequest, UpdateUserRequest, User, UserStatus};

pub(crate) const MAX_LIST_LIMIT: usize = 100;
pub(crate) const MAX_SEARCH_LIMIT: usize = 50;

/// Tagged store failures. `Duplicate` carries the violated field so callers
/// map it to a conflict response without inspecting message text.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("duplicate value for {field}")]
    Duplicate { field: &'static str },
}

#[async_trait]
pub(crate) trait UserStore: Send + Sync {
    async fn create(&self, request: CreateUserRequest) -> Result<User, StoreError>;
    async fn get(&self, id: u64) -> Result<User, StoreError>;
    async fn get_by_subject(&self, subject: &str) -> Result<User, StoreError>;
    async fn get_by_username(&self, username: &str) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<User>, StoreError>;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<User>, StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;
    async fn active(&self) -> Result<Vec<User>, StoreError>;
    async fn update(&self, id: u64, request: UpdateUserRequest) -> Result<User, StoreError>;
    async fn delete(&self, id: u64) -> Result<(), StoreError>;
    async fn record_login(&self, id: u64, info: LoginInfoRequest) -> Result<User, StoreError>;
    /// Create or refresh the record mirroring a verified identity and bump
    /// its login statistics.
    async fn upsert_identity(&self, principal: &Principal) -> Result<User, StoreError>;
}

/// Process-local store. State is lost on restart.
#[derive(Default)]
pub(crate) struct InMemoryUserStore {
    users: RwLock<HashMap<u64, User>>,
    next_id: AtomicU64,
}

impl InMemoryUserStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn duplicate_check(
    users: &HashMap<u64, User>,
    exclude_id: Option<u64>,
    subject: Option<&str>,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<(), StoreError> {
    for user in users.values() {
        if Some(user.id) == exclude_id {
            continue;
        }
        if subject.is_some_and(|subject| user.subject == subject) {
            return Err(StoreError::Duplicate { field: "subject" });
        }
        if email.is_some_and(|email| user.email.eq_ignore_ascii_case(email)) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        if username.is_some_and(|username| user.username == username) {
            return Err(StoreError::Duplicate { field: "username" });
        }
    }

    Ok(())
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, request: CreateUserRequest) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        duplicate_check(
            &users,
            None,
            Some(&request.subject),
            Some(&request.email),
            Some(&request.username),
        )?;

        let now = Timestamp::now();
        let user = User {
            id: self.allocate_id(),
            subject: request.subject,
            email: request.email,
            email_verified: request.email_verified,
            username: request.username,
            first_name: request.first_name,
            last_name: request.last_name,
            provider: request.provider,
            provider_id: request.provider_id,
            created_at: now,
            updated_at: now,
            login_count: 0,
            last_login_at: None,
            last_login_ip: None,
            last_login_device: None,
            disabled: false,
            status: request.status.unwrap_or(UserStatus::Active),
        };

        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get(&self, id: u64) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_subject(&self, subject: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.subject == subject)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;

        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|user| user.id);

        Ok(all
            .into_iter()
            .skip(offset)
            .take(limit.min(MAX_LIST_LIMIT))
            .collect())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<User>, StoreError> {
        let needle = query.to_lowercase();
        let users = self.users.read().await;

        let mut matches: Vec<User> = users
            .values()
            .filter(|user| {
                let haystacks = [
                    Some(user.username.as_str()),
                    Some(user.email.as_str()),
                    user.first_name.as_deref(),
                    user.last_name.as_deref(),
                ];

                haystacks
                    .into_iter()
                    .flatten()
                    .any(|value| value.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        matches.sort_by_key(|user| user.id);
        matches.truncate(limit.min(MAX_SEARCH_LIMIT));

        Ok(matches)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.users.read().await.len())
    }

    async fn active(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;

        let mut active: Vec<User> = users
            .values()
            .filter(|user| user.status == UserStatus::Active && !user.disabled)
            .cloned()
            .collect();

        active.sort_by_key(|user| user.id);

        Ok(active)
    }

    async fn update(&self, id: u64, request: UpdateUserRequest) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if !users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }

        duplicate_check(
            &users,
            Some(id),
            None,
            request.email.as_deref(),
            request.username.as_deref(),
        )?;

        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;

        if let Some(email) = request.email {
            user.email = email;
        }
        if let Some(email_verified) = request.email_verified {
            user.email_verified = email_verified;
        }
        if let Some(username) = request.username {
            user.username = username;
        }
        if let Some(first_name) = request.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = request.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(status) = request.status {
            user.status = status;
        }
        if let Some(disabled) = request.disabled {
            user.disabled = disabled;
        }

        user.updated_at = Timestamp::now();

        Ok(user.clone())
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn record_login(&self, id: u64, info: LoginInfoRequest) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;

        user.login_count += 1;
        user.last_login_at = Some(Timestamp::now());
        user.last_login_ip = info.ip;
        user.last_login_device = info.device;
        user.updated_at = Timestamp::now();

        Ok(user.clone())
    }

    async fn upsert_identity(&self, principal: &Principal) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let now = Timestamp::now();

        let existing_id = users
            .values()
            .find(|user| user.subject == principal.subject)
            .map(|user| user.id);

        if let Some(id) = existing_id {
            let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
            if let Some(email) = &principal.email {
                user.email = email.clone();
            }
            user.login_count += 1;
            user.last_login_at = Some(now);
            user.updated_at = now;

            return Ok(user.clone());
        }

        let email = principal
            .email
            .clone()
            .unwrap_or_else(|| format!("{}@unknown.invalid", principal.subject));

        // Derive a username from the email local part, with the id as a
        // fallback when it collides.
        let id = self.allocate_id();
        let base = email.split('@').next().unwrap_or("user").to_owned();
        let username = if users.values().any(|user| user.username == base) {
            format!("{base}_{id}")
        } else {
            base
        };

        duplicate_check(&users, None, Some(&principal.subject), Some(&email), None)?;

        let user = User {
            id,
            subject: principal.subject.clone(),
            email,
            email_verified: false,
            username,
            first_name: None,
            last_name: None,
            provider: None,
            provider_id: None,
            created_at: now,
            updated_at: now,
            login_count: 1,
            last_login_at: Some(now),
            last_login_ip: None,
            last_login_device: None,
            disabled: false,
            status: UserStatus::Active,
        };

        users.insert(user.id, user.clone());

        Ok(user)
    }
}
