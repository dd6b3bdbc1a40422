//! Process-local stores used when no database is configured, and by the test harness.
//!
//! State is lost on restart, so revocations do not survive a reboot in this mode.

use crate::domain::revocation::RevocationEntry;
use crate::domain::user::{NewUser, ProfileChanges, User, UserFilter, UserPage};
use crate::error::Result;
use crate::services::credential_service::{UserStore, email_taken};
use crate::services::revocation_service::RevocationStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    // normalized email -> id; the unique index
    emails: DashMap<String, Uuid>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables an account. Returns `false` if the user does not exist.
    pub fn set_active(&self, id: Uuid, active: bool) -> bool {
        self.users.get_mut(&id).is_some_and(|mut user| {
            user.active = active;
            user.updated_at = OffsetDateTime::now_utc();
            true
        })
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(id) = self.emails.get(email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn create(&self, new_user: NewUser) -> Result<User> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            phone: new_user.phone,
            role: new_user.role,
            active: true,
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(email_taken()),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<Option<User>> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(first_name) = &changes.first_name {
            user.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name.clone_from(last_name);
        }
        if let Some(phone) = &changes.phone {
            user.phone.clone_from(phone);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(false);
        };
        self.emails.remove(&user.email);
        Ok(true)
    }

    async fn list(&self, filter: &UserFilter) -> Result<UserPage> {
        let mut matching: Vec<User> =
            self.users.iter().filter(|entry| filter.matches(entry.value())).map(|entry| entry.value().clone()).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total_count = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let users = matching.into_iter().skip(offset).take(filter.per_page as usize).collect();

        Ok(UserPage { users, total_count, page: filter.page, per_page: filter.per_page })
    }

    async fn replace_refresh_token(&self, id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.refresh_token_hash = Some(token_hash.to_string());
            user.refresh_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Option<User>> {
        let now = OffsetDateTime::now_utc();
        let owner = self.users.iter().find_map(|entry| {
            let user = entry.value();
            (user.refresh_token_hash.as_deref() == Some(old_hash)).then_some(user.id)
        });
        let Some(id) = owner else {
            return Ok(None);
        };

        // Re-check under the shard write lock so two concurrent exchanges cannot both win.
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        let still_current = user.refresh_token_hash.as_deref() == Some(old_hash)
            && user.refresh_token_expires_at.is_some_and(|exp| exp > now);
        if !still_current {
            return Ok(None);
        }

        user.refresh_token_hash = Some(new_hash.to_string());
        user.refresh_token_expires_at = Some(expires_at);
        Ok(Some(user.clone()))
    }

    async fn clear_refresh_token(&self, id: Uuid) -> Result<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.refresh_token_hash = None;
            user.refresh_token_expires_at = None;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    entries: DashMap<String, RevocationEntry>,
}

impl MemoryRevocationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn insert(&self, entry: &RevocationEntry) -> Result<bool> {
        match self.entries.entry(entry.jti.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(true)
            }
        }
    }

    async fn contains(&self, jti: &str) -> Result<bool> {
        Ok(self.entries.contains_key(jti))
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64> {
        let removed = AtomicU64::new(0);
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed.fetch_add(1, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
        Ok(removed.into_inner())
    }
}
