use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Account role. Persisted and transported as its lowercase tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Owner,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            other => Err(format!("Role '{other}' is not included in the list")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub active: bool,
    pub refresh_token_hash: Option<String>,
    pub refresh_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

/// Self-service profile edits. `None` leaves a column untouched; `Some(None)` clears an
/// optional column.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

impl ProfileChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub page: u32,
    pub per_page: u32,
}

impl UserFilter {
    /// Builds a filter from raw query values, clamping pagination to sane bounds.
    #[must_use]
    pub fn new(search: Option<String>, role: Option<Role>, page: Option<u32>, per_page: Option<u32>) -> Self {
        let search = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            search,
            role,
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    /// Case-insensitive substring match over names and email.
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        if let Some(role) = self.role
            && user.role != role
        {
            return false;
        }

        let Some(term) = &self.search else {
            return true;
        };
        let term = term.to_lowercase();
        user.first_name.to_lowercase().contains(&term)
            || user.last_name.as_deref().is_some_and(|l| l.to_lowercase().contains(&term))
            || user.email.contains(&term)
    }
}

impl Default for UserFilter {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total_count: i64,
    pub page: u32,
    pub per_page: u32,
}

impl UserPage {
    #[must_use]
    pub fn total_pages(&self) -> i64 {
        let per_page = i64::from(self.per_page.max(1));
        (self.total_count + per_page - 1) / per_page
    }
}

/// Emails are unique regardless of case, so they are stored and looked up in this form.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose shape check: one `@`, a non-empty local part, and a dotted domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: Option<&str>, email: &str, role: Role) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: first.to_string(),
            last_name: last.map(ToString::to_string),
            phone: None,
            role,
            active: true,
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" owner ".parse::<Role>().unwrap(), Role::Owner);
        assert!("landlord".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_full_name() {
        assert_eq!(user("Ada", Some("Lovelace"), "a@b.io", Role::Owner).full_name(), "Ada Lovelace");
        assert_eq!(user("Ada", None, "a@b.io", Role::Owner).full_name(), "Ada");
        assert_eq!(user("Ada", Some("  "), "a@b.io", Role::Owner).full_name(), "Ada");
    }

    #[test]
    fn test_filter_pagination_bounds() {
        let filter = UserFilter::new(Some("  ".into()), None, Some(0), Some(500));
        assert_eq!(filter.search, None);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, MAX_PER_PAGE);
        assert_eq!(filter.offset(), 0);

        let filter = UserFilter::new(None, None, Some(3), Some(10));
        assert_eq!(filter.offset(), 20);
    }

    #[test]
    fn test_filter_matching() {
        let ada = user("Ada", Some("Lovelace"), "ada@example.com", Role::Admin);
        let bob = user("Bob", None, "bob@example.com", Role::Owner);

        let by_name = UserFilter::new(Some("LOVE".into()), None, None, None);
        assert!(by_name.matches(&ada));
        assert!(!by_name.matches(&bob));

        let by_role = UserFilter::new(None, Some(Role::Owner), None, None);
        assert!(!by_role.matches(&ada));
        assert!(by_role.matches(&bob));

        let by_email = UserFilter::new(Some("bob@".into()), None, None, None);
        assert!(by_email.matches(&bob));
    }

    #[test]
    fn test_total_pages() {
        let page = UserPage { users: vec![], total_count: 41, page: 1, per_page: 20 };
        assert_eq!(page.total_pages(), 3);
        let empty = UserPage { users: vec![], total_count: 0, page: 1, per_page: 20 };
        assert_eq!(empty.total_pages(), 0);
    }

    #[test]
    fn test_email_helpers() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("ada@localhost"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@@example.com"));
    }
}
