use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::time::timeout;

use crate::error::{Result, VerificationError};
use crate::models::{ComprehensiveVerificationResult, RiskAssessment, UserId};
use crate::providers::{ProviderRegistry, VerificationCredentials};
use crate::scoring::{risk_level_for, BankingRiskScorer, ProcessorRiskScorer};
use crate::store::Store;

// Runs every applicable provider scorer concurrently and merges whatever
// succeeds. A provider without a client or without credentials is skipped
// outright; only attempted-and-failed calls land in `errors`.
pub struct ComprehensiveVerifier {
    store: Arc<dyn Store>,
    providers: ProviderRegistry,
    provider_timeout: Duration,
}

impl ComprehensiveVerifier {
    pub fn new(store: Arc<dyn Store>, providers: ProviderRegistry, provider_timeout: Duration) -> Self {
        ComprehensiveVerifier {
            store,
            providers,
            provider_timeout,
        }
    }

    pub async fn perform_comprehensive_verification(
        &self,
        user_id: UserId,
        credentials: &VerificationCredentials,
    ) -> Result<ComprehensiveVerificationResult> {
        self.store.get_user(user_id).await?;

        // Cross-provider calls have no ordering dependency; running them
        // together bounds latency by the slowest provider, not the sum.
        let banking_task = async {
            match (self.providers.banking(), credentials.banking.as_ref()) {
                (Some(provider), Some(creds)) => Some(
                    timeout(
                        self.provider_timeout,
                        BankingRiskScorer.assess(provider.as_ref(), &creds.access_token),
                    )
                    .await
                    .map_err(|_| {
                        VerificationError::ProviderFailure(
                            "banking provider timed out".to_string(),
                        )
                    })
                    .and_then(|r| r),
                ),
                _ => {
                    debug!("banking scorer skipped: provider or credentials absent");
                    None
                }
            }
        };

        let processor_task = async {
            match (self.providers.processor(), credentials.processor.as_ref()) {
                (Some(provider), Some(creds)) => Some(
                    timeout(
                        self.provider_timeout,
                        ProcessorRiskScorer.assess(provider.as_ref(), creds),
                    )
                    .await
                    .map_err(|_| {
                        VerificationError::ProviderFailure(
                            "payment processor timed out".to_string(),
                        )
                    })
                    .and_then(|r| r),
                ),
                _ => {
                    debug!("processor scorer skipped: provider or credentials absent");
                    None
                }
            }
        };

        let (banking_outcome, processor_outcome) = tokio::join!(banking_task, processor_task);

        let mut assessments: Vec<RiskAssessment> = Vec::new();
        let mut verification_methods = Vec::new();
        let mut errors = Vec::new();

        let outcomes = [
            ("bank_account", banking_outcome),
            ("payment_method", processor_outcome),
        ];
        for (method, outcome) in outcomes {
            match outcome {
                None => {}
                Some(Ok(assessment)) => {
                    verification_methods.push(method.to_string());
                    assessments.push(assessment);
                }
                Some(Err(e)) => errors.push(format!("{}: {}", method, e)),
            }
        }

        let success = !assessments.is_empty();

        // Verification confidence is the complement of risk; the combined
        // score is the mean over scorers that produced a result.
        let score = if success {
            assessments
                .iter()
                .map(|a| 100.0 - a.risk_score)
                .sum::<f64>()
                / assessments.len() as f64
        } else {
            0.0
        };
        let risk_level = risk_level_for(100.0 - score);

        let mut recommendations: Vec<String> = Vec::new();
        for assessment in &assessments {
            for rec in &assessment.recommendations {
                if !recommendations.contains(rec) {
                    recommendations.push(rec.clone());
                }
            }
        }

        info!(
            "comprehensive verification for {}: success={} score={:.1} methods={:?} errors={}",
            user_id,
            success,
            score,
            verification_methods,
            errors.len()
        );

        Ok(ComprehensiveVerificationResult {
            success,
            score,
            risk_level,
            assessments,
            recommendations,
            errors,
            verification_methods,
        })
    }
}
