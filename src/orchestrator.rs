use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use tokio::time::timeout;

use crate::error::{Result, VerificationError};
use crate::handlers::{HandlerOutcome, HandlerRegistry};
use crate::models::{
    AccessTier, ReputationRecord, User, UserId, VerificationRecord, VerificationResult,
    VerificationStatus, VerificationStatusSummary, VerificationType,
};
use crate::providers::{ProcessorCredentials, ProviderRegistry};
use crate::reputation::{access_tier, reputation_score};
use crate::scoring::{BankingRiskScorer, ProcessorRiskScorer};
use crate::store::Store;

/// Provider-scored verifications are accepted below this risk score;
/// Very High risk is the only rejecting band.
const PROVIDER_ACCEPT_THRESHOLD: f64 = 80.0;

// Drives the per-attempt state machine: PENDING -> {VERIFIED | REJECTED}.
// Handler and provider failures are converted to a REJECTED terminal
// state, so no record is ever left PENDING by an internal error.
pub struct VerificationOrchestrator {
    store: Arc<dyn Store>,
    handlers: HandlerRegistry,
    providers: ProviderRegistry,
    provider_timeout: Duration,
}

impl VerificationOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        handlers: HandlerRegistry,
        providers: ProviderRegistry,
        provider_timeout: Duration,
    ) -> Self {
        VerificationOrchestrator {
            store,
            handlers,
            providers,
            provider_timeout,
        }
    }

    /// Submit one verification attempt. The PENDING record is the audit
    /// anchor even for ultimately-rejected attempts; retries after a
    /// rejection always create a new record.
    pub async fn verify_user(
        &self,
        user_id: UserId,
        verification_type: VerificationType,
        data: serde_json::Value,
    ) -> Result<VerificationResult> {
        // Unknown user short-circuits before any record is created.
        let user = self.store.get_user(user_id).await?;

        let record = self
            .store
            .create_verification(user_id, verification_type, data.clone())
            .await?;

        let outcome = self.run_verification(&user, verification_type, &data).await;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "verification {} ({:?}) failed internally: {}",
                    record.id, verification_type, e
                );
                HandlerOutcome::reject(format!("verification failed: {}", e))
            }
        };

        let (status, verified_at) = if outcome.accepted {
            (VerificationStatus::Verified, Some(Utc::now()))
        } else {
            (VerificationStatus::Rejected, None)
        };

        if let Err(e) = self
            .store
            .update_verification(record.id, status, verified_at)
            .await
        {
            error!("failed to persist terminal state for {}: {}", record.id, e);
            return Ok(VerificationResult {
                success: false,
                message: format!("failed to persist verification outcome: {}", e),
                record_id: Some(record.id),
            });
        }

        info!(
            "verification {} ({:?}) for user {} -> {:?}",
            record.id, verification_type, user_id, status
        );

        if outcome.accepted {
            // Keep the reputation counters current; a stale score here is
            // recoverable since every tier check recomputes anyway.
            if let Err(e) = self.refresh_reputation(&user).await {
                error!("failed to refresh reputation for {}: {}", user_id, e);
            }
        }

        Ok(VerificationResult {
            success: outcome.accepted,
            message: outcome.reason,
            record_id: Some(record.id),
        })
    }

    /// Current tier, recomputed from stored counters on every call.
    pub async fn get_user_access_tier(&self, user_id: UserId) -> Result<AccessTier> {
        let user = self.store.get_user(user_id).await?;
        let reputation = self.refresh_reputation(&user).await?;
        Ok(access_tier(
            reputation.score,
            reputation.verification_count,
            reputation.account_age_days,
        ))
    }

    /// Distinct verification types grouped by status.
    pub async fn get_user_verification_status(
        &self,
        user_id: UserId,
    ) -> Result<VerificationStatusSummary> {
        self.store.get_user(user_id).await?;
        let records = self.store.get_verifications_by_user(user_id).await?;

        let verified = distinct_types(&records, VerificationStatus::Verified);
        let pending = distinct_types(&records, VerificationStatus::Pending);
        // A type that eventually verified is not re-reported as rejected.
        let rejected: Vec<VerificationType> =
            distinct_types(&records, VerificationStatus::Rejected)
                .into_iter()
                .filter(|t| !verified.contains(t))
                .collect();

        Ok(VerificationStatusSummary {
            verified,
            pending,
            rejected,
        })
    }

    /// Recompute the reputation record from current stored state: distinct
    /// verified types, refreshed account age, and the score formula over
    /// both. Creates the record lazily on first access.
    pub async fn refresh_reputation(&self, user: &User) -> Result<ReputationRecord> {
        let records = self.store.get_verifications_by_user(user.id).await?;
        let distinct: HashSet<VerificationType> = records
            .iter()
            .filter(|r| r.status == VerificationStatus::Verified)
            .map(|r| r.verification_type)
            .collect();

        let mut reputation = self
            .store
            .get_reputation(user.id)
            .await?
            .unwrap_or_else(|| ReputationRecord::new(user.id));

        reputation.verification_count = distinct.len() as u32;
        reputation.account_age_days = user.account_age_days(Utc::now());
        reputation.score = reputation_score(&reputation);

        self.store.update_reputation(reputation).await
    }

    async fn run_verification(
        &self,
        user: &User,
        verification_type: VerificationType,
        data: &serde_json::Value,
    ) -> Result<HandlerOutcome> {
        match verification_type {
            VerificationType::BankAccount => self.verify_bank_account(data).await,
            VerificationType::PaymentMethod => self.verify_payment_method(data).await,
            _ => {
                let handler = self.handlers.get(verification_type).ok_or_else(|| {
                    VerificationError::InternalFailure(format!(
                        "no handler registered for {:?}",
                        verification_type
                    ))
                })?;
                Ok(handler.handle(user, data))
            }
        }
    }

    async fn verify_bank_account(&self, data: &serde_json::Value) -> Result<HandlerOutcome> {
        let provider = self
            .providers
            .banking()
            .ok_or(VerificationError::ConfigurationAbsent("banking"))?;

        let access_token = data
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                VerificationError::ValidationFailure("banking access token is required".to_string())
            })?;

        let assessment = timeout(
            self.provider_timeout,
            BankingRiskScorer.assess(provider.as_ref(), access_token),
        )
        .await
        .map_err(|_| VerificationError::ProviderFailure("banking provider timed out".to_string()))??;

        Ok(outcome_from_risk(assessment.risk_score, "bank account"))
    }

    async fn verify_payment_method(&self, data: &serde_json::Value) -> Result<HandlerOutcome> {
        let provider = self
            .providers
            .processor()
            .ok_or(VerificationError::ConfigurationAbsent("payment processor"))?;

        let customer_id = data.get("customer_id").and_then(|v| v.as_str());
        let payment_method_id = data.get("payment_method_id").and_then(|v| v.as_str());
        let (Some(customer_id), Some(payment_method_id)) = (customer_id, payment_method_id) else {
            return Err(VerificationError::ValidationFailure(
                "customer id and payment method id are required".to_string(),
            ));
        };

        let credentials = ProcessorCredentials {
            customer_id: customer_id.to_string(),
            payment_method_id: payment_method_id.to_string(),
        };

        let assessment = timeout(
            self.provider_timeout,
            ProcessorRiskScorer.assess(provider.as_ref(), &credentials),
        )
        .await
        .map_err(|_| {
            VerificationError::ProviderFailure("payment processor timed out".to_string())
        })??;

        Ok(outcome_from_risk(assessment.risk_score, "payment method"))
    }
}

fn outcome_from_risk(risk_score: f64, method: &str) -> HandlerOutcome {
    if risk_score < PROVIDER_ACCEPT_THRESHOLD {
        HandlerOutcome::accept(format!(
            "{} verified (risk score {:.1})",
            method, risk_score
        ))
    } else {
        HandlerOutcome::reject(format!(
            "{} rejected: provider risk score {:.1} too high",
            method, risk_score
        ))
    }
}

fn distinct_types(
    records: &[VerificationRecord],
    status: VerificationStatus,
) -> Vec<VerificationType> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.status == status)
        .map(|r| r.verification_type)
        .filter(|t| seen.insert(*t))
        .collect()
}
