use time::OffsetDateTime;
use uuid::Uuid;

/// An access token invalidated before its natural expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub jti: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

impl RevocationEntry {
    /// Once the token itself has expired the entry no longer protects anything.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }
}
