use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use crate::error::Result;
use crate::models::{RiskAssessment, RiskLevel};
use crate::providers::{
    AuthorizationStatus, BankAccount, BankingProvider, IdentityOwner, PaymentAuthorization,
    PaymentProcessor, ProcessorCredentials, ProviderTransaction,
};

/// Neutral starting point before any factor is applied.
const BASELINE_SCORE: f64 = 50.0;

/// Lookback window for provider transaction history.
const TRANSACTION_WINDOW_DAYS: i64 = 90;

/// Amount placed on hold to confirm a payment method, released immediately.
const VERIFICATION_AUTH_AMOUNT: Decimal = dec!(1.00);

/// Deposit cadences, in days, that indicate regular income.
const RECURRING_ANCHOR_DAYS: [f64; 5] = [14.0, 15.0, 28.0, 30.0, 31.0];

/// Allowed jitter around the cadence, in days.
const RECURRING_GAP_TOLERANCE: f64 = 3.0;

/// Map a 0-100 risk score onto the five-bucket ladder. Lower is safer.
pub fn risk_level_for(score: f64) -> RiskLevel {
    if score < 20.0 {
        RiskLevel::VeryLow
    } else if score < 40.0 {
        RiskLevel::Low
    } else if score < 60.0 {
        RiskLevel::Medium
    } else if score < 80.0 {
        RiskLevel::High
    } else {
        RiskLevel::VeryHigh
    }
}

/// Fixed ladder of policy suggestions, strictest band first.
pub fn recommendations_for(score: f64) -> Vec<String> {
    let suggestions: &[&str] = if score > 80.0 {
        &[
            "Require enhanced due diligence before activation",
            "Apply hard transaction limits",
            "Escalate to manual compliance review",
        ]
    } else if score > 60.0 {
        &[
            "Apply moderate transaction limits",
            "Schedule periodic account review",
        ]
    } else if score > 40.0 {
        &[
            "Apply standard transaction limits",
            "Monitor account activity",
        ]
    } else if score > 20.0 {
        &["Standard limits apply"]
    } else {
        &["Eligible for relaxed transaction limits"]
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Two amounts belong to the same deposit stream if they differ by at most
/// one currency unit, or by at most 10% of the larger amount.
fn amounts_match(a: Decimal, b: Decimal) -> bool {
    let diff = (a - b).abs();
    if diff <= Decimal::ONE {
        return true;
    }
    let larger = a.abs().max(b.abs());
    !larger.is_zero() && diff / larger <= dec!(0.1)
}

/// Income signal: groups entries by near-equal amount, then looks for a
/// group whose inter-event gaps are mutually consistent (within ±3 days)
/// and sit near a payroll cadence (14, 15, 28, 30, or 31 days). Two
/// occurrences are enough to establish a stream.
pub fn detect_recurring(entries: &[(Decimal, DateTime<Utc>)]) -> bool {
    let mut groups: Vec<Vec<(Decimal, DateTime<Utc>)>> = Vec::new();
    'outer: for entry in entries {
        for group in groups.iter_mut() {
            if amounts_match(group[0].0, entry.0) {
                group.push(*entry);
                continue 'outer;
            }
        }
        groups.push(vec![*entry]);
    }

    for group in groups.iter_mut() {
        if group.len() < 2 {
            continue;
        }
        group.sort_by_key(|(_, date)| *date);

        let gaps: Vec<i64> = group
            .windows(2)
            .map(|w| (w[1].1 - w[0].1).num_days())
            .collect();
        let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;

        let consistent = gaps
            .iter()
            .all(|g| (*g as f64 - mean).abs() <= RECURRING_GAP_TOLERANCE);
        let anchored = RECURRING_ANCHOR_DAYS
            .iter()
            .any(|anchor| (mean - anchor).abs() <= RECURRING_GAP_TOLERANCE);

        if consistent && anchored {
            return true;
        }
    }
    false
}

/// Recurring-deposit detection over banking transactions; only inflows
/// count as deposits.
pub fn detect_recurring_deposits(transactions: &[ProviderTransaction]) -> bool {
    let deposits: Vec<(Decimal, DateTime<Utc>)> = transactions
        .iter()
        .filter(|t| t.amount > Decimal::ZERO)
        .map(|t| (t.amount, t.date))
        .collect();
    detect_recurring(&deposits)
}

fn estimated_age_days(dates: impl Iterator<Item = DateTime<Utc>>) -> Option<i64> {
    dates.min().map(|d| (Utc::now() - d).num_days().max(0))
}

/// Score raw banking data. Pure: all provider I/O happens in the scorer.
pub fn score_bank_data(
    accounts: &[BankAccount],
    transactions: &[ProviderTransaction],
    identity: &[IdentityOwner],
) -> RiskAssessment {
    let mut score = BASELINE_SCORE;

    let total_balance: Decimal = accounts.iter().map(|a| a.balance).sum();
    if total_balance < dec!(100) {
        score += 15.0;
    } else if total_balance >= dec!(1000) {
        score -= 10.0;
    }

    // No true "opened" date from the provider; the oldest transaction in
    // the window is the best available estimate.
    let age_days = estimated_age_days(transactions.iter().map(|t| t.date));
    match age_days {
        Some(days) if days < 30 => score += 20.0,
        Some(days) if days > 180 => score -= 10.0,
        _ => {}
    }

    if transactions.len() < 5 {
        score += 10.0;
    } else if transactions.len() > 20 {
        score -= 5.0;
    }

    let has_recurring_deposits = detect_recurring_deposits(transactions);
    if has_recurring_deposits {
        score -= 15.0;
    } else {
        score += 10.0;
    }

    let identity_on_file = identity.iter().any(|owner| !owner.names.is_empty());
    if identity_on_file {
        score -= 10.0;
    } else {
        score += 15.0;
    }

    let risk_score = clamp_score(score);
    RiskAssessment {
        provider: "banking".to_string(),
        risk_score,
        risk_level: risk_level_for(risk_score),
        factors: json!({
            "total_balance": total_balance,
            "estimated_account_age_days": age_days,
            "transaction_count": transactions.len(),
            "has_recurring_deposits": has_recurring_deposits,
            "identity_on_file": identity_on_file,
        }),
        recommendations: recommendations_for(risk_score),
    }
}

/// Score payment-processor data: the outcome of a minimal authorization
/// probe plus the customer's settled charge history.
pub fn score_processor_data(authorized: bool, history: &[PaymentAuthorization]) -> RiskAssessment {
    let mut score = BASELINE_SCORE;

    let settled: Vec<&PaymentAuthorization> = history
        .iter()
        .filter(|a| a.status == AuthorizationStatus::Succeeded)
        .collect();

    let total_volume: Decimal = settled.iter().map(|a| a.amount).sum();
    if total_volume < dec!(50) {
        score += 20.0;
    } else if total_volume >= dec!(500) {
        score -= 15.0;
    }

    let age_days = estimated_age_days(settled.iter().map(|a| a.created));
    match age_days {
        Some(days) if days < 30 => score += 20.0,
        Some(days) if days > 365 => score -= 15.0,
        _ => {}
    }

    if settled.len() < 5 {
        score += 15.0;
    } else if settled.len() > 50 {
        score -= 10.0;
    }

    // Regular settled charges of the same amount read as a subscription or
    // payroll-adjacent pattern, the processor-side income signal.
    let charges: Vec<(Decimal, DateTime<Utc>)> =
        settled.iter().map(|a| (a.amount, a.created)).collect();
    let has_recurring_charges = detect_recurring(&charges);
    if has_recurring_charges {
        score -= 20.0;
    } else {
        score += 15.0;
    }

    if authorized {
        score -= 10.0;
    } else {
        score += 20.0;
    }

    let risk_score = clamp_score(score);
    RiskAssessment {
        provider: "payment_processor".to_string(),
        risk_score,
        risk_level: risk_level_for(risk_score),
        factors: json!({
            "total_settled_volume": total_volume,
            "estimated_account_age_days": age_days,
            "settled_charge_count": settled.len(),
            "has_recurring_charges": has_recurring_charges,
            "authorization_succeeded": authorized,
        }),
        recommendations: recommendations_for(risk_score),
    }
}

// Scorer over the banking-data provider
pub struct BankingRiskScorer;

impl BankingRiskScorer {
    /// The three provider calls feed a single scoring pass and are
    /// mutually dependent inputs, so they run sequentially.
    pub async fn assess(
        &self,
        provider: &dyn BankingProvider,
        access_token: &str,
    ) -> Result<RiskAssessment> {
        let accounts = provider.get_accounts(access_token).await?;

        let end = Utc::now();
        let start = end - Duration::days(TRANSACTION_WINDOW_DAYS);
        let transactions = provider.get_transactions(access_token, start, end).await?;

        let identity = provider.get_identity(access_token).await?;

        let assessment = score_bank_data(&accounts, &transactions, &identity);
        debug!(
            "banking assessment: score={} level={}",
            assessment.risk_score,
            assessment.risk_level.as_str()
        );
        Ok(assessment)
    }
}

// Scorer over the payment-processor provider
pub struct ProcessorRiskScorer;

impl ProcessorRiskScorer {
    pub async fn assess(
        &self,
        provider: &dyn PaymentProcessor,
        credentials: &ProcessorCredentials,
    ) -> Result<RiskAssessment> {
        provider
            .attach_payment_method(&credentials.customer_id, &credentials.payment_method_id)
            .await?;

        let auth = provider
            .create_verification_authorization(
                &credentials.customer_id,
                &credentials.payment_method_id,
                VERIFICATION_AUTH_AMOUNT,
            )
            .await?;
        let authorized = auth.is_authorized();

        // Release the hold; a failed release does not invalidate the
        // scoring inputs already gathered.
        if authorized {
            if let Err(e) = provider.cancel_authorization(&auth.authorization_id).await {
                warn!(
                    "failed to release verification hold {}: {}",
                    auth.authorization_id, e
                );
            }
        }

        let intents = provider.list_payment_intents(&credentials.customer_id).await?;
        // The probe we just created is not part of the customer's history.
        let history: Vec<PaymentAuthorization> = intents
            .into_iter()
            .filter(|a| a.authorization_id != auth.authorization_id)
            .collect();

        let assessment = score_processor_data(authorized, &history);
        debug!(
            "processor assessment: score={} level={}",
            assessment.risk_score,
            assessment.risk_level.as_str()
        );
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{AuthorizationStatus, SimulatedBankingProvider, SimulatedPaymentProcessor};
    use uuid::Uuid;

    fn deposits_at_interval(amount: Decimal, interval_days: &[i64]) -> Vec<(Decimal, DateTime<Utc>)> {
        let mut date = Utc::now() - Duration::days(90);
        let mut entries = vec![(amount, date)];
        for gap in interval_days {
            date = date + Duration::days(*gap);
            entries.push((amount, date));
        }
        entries
    }

    #[test]
    fn test_recurring_detected_at_payroll_cadences() {
        // 14-day, 30-day, and 31-day cadences with up to 2 days of jitter
        assert!(detect_recurring(&deposits_at_interval(dec!(2000), &[14, 16, 13, 14])));
        assert!(detect_recurring(&deposits_at_interval(dec!(1250.50), &[30, 28, 31])));
        assert!(detect_recurring(&deposits_at_interval(dec!(900), &[31, 30])));
    }

    #[test]
    fn test_recurring_not_detected_for_irregular_activity() {
        let now = Utc::now();
        let entries = vec![
            (dec!(17.42), now - Duration::days(81)),
            (dec!(211.00), now - Duration::days(70)),
            (dec!(3.99), now - Duration::days(44)),
            (dec!(87.10), now - Duration::days(41)),
            (dec!(640.00), now - Duration::days(9)),
        ];
        assert!(!detect_recurring(&entries));
    }

    #[test]
    fn test_recurring_rejects_wrong_cadence() {
        // Consistent weekly gaps are not near any anchor
        assert!(!detect_recurring(&deposits_at_interval(dec!(500), &[7, 7, 7, 7])));
        // Single occurrence is not a stream
        assert!(!detect_recurring(&[(dec!(2000), Utc::now())]));
    }

    #[test]
    fn test_amount_tolerance_bands() {
        // Within one currency unit
        assert!(amounts_match(dec!(100.00), dec!(100.99)));
        // Within 10% relative
        assert!(amounts_match(dec!(2000), dec!(1850)));
        assert!(!amounts_match(dec!(2000), dec!(1700)));
        assert!(!amounts_match(dec!(10), dec!(12)));
    }

    #[test]
    fn test_risk_score_clamped_for_empty_provider_data() {
        let assessment = score_bank_data(&[], &[], &[]);
        assert!((0.0..=100.0).contains(&assessment.risk_score));
        assert_eq!(assessment.risk_score, 100.0);
        assert_eq!(assessment.risk_level, RiskLevel::VeryHigh);

        let assessment = score_processor_data(false, &[]);
        assert!((0.0..=100.0).contains(&assessment.risk_score));
        assert_eq!(assessment.risk_score, 100.0);
    }

    #[test]
    fn test_risk_level_buckets() {
        assert_eq!(risk_level_for(0.0), RiskLevel::VeryLow);
        assert_eq!(risk_level_for(19.9), RiskLevel::VeryLow);
        assert_eq!(risk_level_for(20.0), RiskLevel::Low);
        assert_eq!(risk_level_for(40.0), RiskLevel::Medium);
        assert_eq!(risk_level_for(60.0), RiskLevel::High);
        assert_eq!(risk_level_for(80.0), RiskLevel::VeryHigh);
        assert_eq!(risk_level_for(100.0), RiskLevel::VeryHigh);
    }

    #[test]
    fn test_recommendations_tighten_with_score() {
        let relaxed = recommendations_for(10.0);
        assert!(relaxed.iter().any(|r| r.contains("relaxed")));

        let strict = recommendations_for(90.0);
        assert!(strict.iter().any(|r| r.contains("enhanced due diligence")));
        assert!(strict.iter().any(|r| r.contains("hard transaction limits")));
    }

    #[tokio::test]
    async fn test_banking_scorer_on_healthy_profile() {
        let provider = SimulatedBankingProvider::sample();
        let assessment = BankingRiskScorer.assess(&provider, "token").await.unwrap();

        // Healthy balance, recurring payroll, identity on file
        assert_eq!(assessment.risk_score, 15.0);
        assert_eq!(assessment.risk_level, RiskLevel::VeryLow);
        assert_eq!(assessment.factors["has_recurring_deposits"], true);
        assert_eq!(assessment.factors["identity_on_file"], true);
    }

    #[tokio::test]
    async fn test_processor_scorer_excludes_probe_from_history() {
        let provider = SimulatedPaymentProcessor::sample();
        let assessment = ProcessorRiskScorer
            .assess(
                &provider,
                &ProcessorCredentials {
                    customer_id: "cus_1".to_string(),
                    payment_method_id: "pm_1".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(assessment.factors["settled_charge_count"], 12);
        assert_eq!(assessment.factors["authorization_succeeded"], true);
        assert_eq!(assessment.factors["has_recurring_charges"], true);
        assert!(assessment.risk_score <= 40.0);
    }

    #[tokio::test]
    async fn test_processor_scorer_penalizes_declined_authorization() {
        let now = Utc::now();
        let history = vec![PaymentAuthorization {
            authorization_id: Uuid::new_v4().to_string(),
            amount: dec!(10.00),
            status: AuthorizationStatus::Succeeded,
            created: now - Duration::days(10),
        }];
        let provider = SimulatedPaymentProcessor::new(false, history);
        let assessment = ProcessorRiskScorer
            .assess(
                &provider,
                &ProcessorCredentials {
                    customer_id: "cus_2".to_string(),
                    payment_method_id: "pm_2".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(assessment.factors["authorization_succeeded"], false);
        assert!(assessment.risk_score >= 80.0);
        assert_eq!(assessment.risk_level, RiskLevel::VeryHigh);
    }
}
