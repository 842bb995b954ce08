use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, VerificationError};
use crate::models::{
    ReputationRecord, User, UserId, VerificationId, VerificationRecord, VerificationStatus,
    VerificationType,
};

// Narrow interface over the durable store. The engine only needs
// create/read/update keyed by user id and verification id; single-record
// writes are assumed serializable by the store itself.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<User>;

    async fn create_verification(
        &self,
        user_id: UserId,
        verification_type: VerificationType,
        submitted_data: serde_json::Value,
    ) -> Result<VerificationRecord>;

    async fn get_verification(&self, id: VerificationId) -> Result<VerificationRecord>;

    async fn update_verification(
        &self,
        id: VerificationId,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<VerificationRecord>;

    async fn get_verifications_by_user(&self, user_id: UserId) -> Result<Vec<VerificationRecord>>;

    async fn get_reputation(&self, user_id: UserId) -> Result<Option<ReputationRecord>>;

    /// Upsert: writes the full record, creating it if absent.
    async fn update_reputation(&self, record: ReputationRecord) -> Result<ReputationRecord>;
}

// In-memory store used by tests and the demo binary
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    verifications: RwLock<Vec<VerificationRecord>>,
    reputations: RwLock<Vec<ReputationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            users: RwLock::new(Vec::new()),
            verifications: RwLock::new(Vec::new()),
            reputations: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_user(&self, user: User) -> Result<UserId> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.id == user.id) {
            return Err(VerificationError::InternalFailure(format!(
                "user already exists: {}",
                user.id
            )));
        }
        let user_id = user.id;
        users.push(user);
        Ok(user_id)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<User> {
        let users = self.users.read().await;
        users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| VerificationError::NotFound(format!("user {}", id)))
    }

    async fn create_verification(
        &self,
        user_id: UserId,
        verification_type: VerificationType,
        submitted_data: serde_json::Value,
    ) -> Result<VerificationRecord> {
        let record = VerificationRecord {
            id: Uuid::new_v4(),
            user_id,
            verification_type,
            status: VerificationStatus::Pending,
            submitted_data,
            created_at: Utc::now(),
            verified_at: None,
        };

        debug!(
            "created verification record {} ({:?}) for user {}",
            record.id, verification_type, user_id
        );

        let mut verifications = self.verifications.write().await;
        verifications.push(record.clone());
        Ok(record)
    }

    async fn get_verification(&self, id: VerificationId) -> Result<VerificationRecord> {
        let verifications = self.verifications.read().await;
        verifications
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| VerificationError::NotFound(format!("verification {}", id)))
    }

    async fn update_verification(
        &self,
        id: VerificationId,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<VerificationRecord> {
        let mut verifications = self.verifications.write().await;

        let record = verifications
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| VerificationError::NotFound(format!("verification {}", id)))?;

        // Terminal states are final; a retry creates a new record instead.
        if record.status != VerificationStatus::Pending {
            return Err(VerificationError::InternalFailure(format!(
                "verification {} already in terminal state {:?}",
                id, record.status
            )));
        }

        record.status = status;
        record.verified_at = verified_at;
        Ok(record.clone())
    }

    async fn get_verifications_by_user(&self, user_id: UserId) -> Result<Vec<VerificationRecord>> {
        let verifications = self.verifications.read().await;
        Ok(verifications
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_reputation(&self, user_id: UserId) -> Result<Option<ReputationRecord>> {
        let reputations = self.reputations.read().await;
        Ok(reputations.iter().find(|r| r.user_id == user_id).cloned())
    }

    async fn update_reputation(&self, record: ReputationRecord) -> Result<ReputationRecord> {
        let mut reputations = self.reputations.write().await;

        match reputations.iter_mut().find(|r| r.user_id == record.user_id) {
            Some(existing) => *existing = record.clone(),
            None => reputations.push(record.clone()),
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_verification_lifecycle() {
        let store = MemoryStore::new();
        let user = User::new();
        let user_id = store.add_user(user).await.unwrap();

        let record = store
            .create_verification(user_id, VerificationType::PhoneNumber, json!({}))
            .await
            .unwrap();
        assert_eq!(record.status, VerificationStatus::Pending);
        assert!(record.verified_at.is_none());

        let now = Utc::now();
        let updated = store
            .update_verification(record.id, VerificationStatus::Verified, Some(now))
            .await
            .unwrap();
        assert_eq!(updated.status, VerificationStatus::Verified);
        assert_eq!(updated.verified_at, Some(now));

        // A terminal record cannot transition again
        let err = store
            .update_verification(record.id, VerificationStatus::Rejected, None)
            .await;
        assert!(err.is_err());

        let fetched = store.get_verification(record.id).await.unwrap();
        assert_eq!(fetched.status, VerificationStatus::Verified);
    }

    #[tokio::test]
    async fn test_reputation_upsert() {
        let store = MemoryStore::new();
        let user = User::new();
        let user_id = store.add_user(user).await.unwrap();

        assert!(store.get_reputation(user_id).await.unwrap().is_none());

        let mut rep = ReputationRecord::new(user_id);
        rep.verification_count = 2;
        store.update_reputation(rep.clone()).await.unwrap();

        let fetched = store.get_reputation(user_id).await.unwrap().unwrap();
        assert_eq!(fetched.verification_count, 2);

        rep.verification_count = 3;
        store.update_reputation(rep).await.unwrap();
        let fetched = store.get_reputation(user_id).await.unwrap().unwrap();
        assert_eq!(fetched.verification_count, 3);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, VerificationError::NotFound(_)));
    }
}
