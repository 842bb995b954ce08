//! Reputation scoring and access-tier derivation. Everything here is a
//! pure function over a reputation record; staleness is handled by the
//! orchestrator recomputing before every read that needs the score.

use crate::models::{AccessTier, ReputationRecord};

/// Weighted reputation score in [0, 100]. Transaction quality carries 50
/// points, distinct verified types up to 25, account age up to 25 (one
/// month of age earns the full 25).
pub fn reputation_score(record: &ReputationRecord) -> f64 {
    let transaction_score = if record.total_transactions > 0 {
        record.positive_transactions as f64 / record.total_transactions as f64 * 50.0
    } else {
        0.0
    };

    let verification_score = (record.verification_count as f64 * 12.5).min(25.0);
    let age_score = (record.account_age_days.max(0) as f64 / 30.0 * 25.0).min(25.0);

    transaction_score + verification_score + age_score
}

/// Tier ladder, first match wins. Monotonic: improving any single input
/// never lowers the tier.
pub fn access_tier(score: f64, verified_count: u32, account_age_days: i64) -> AccessTier {
    if verified_count >= 2 && score >= 50.0 && account_age_days >= 30 {
        AccessTier::Full
    } else if verified_count >= 1 && score >= 25.0 && account_age_days >= 15 {
        AccessTier::Standard
    } else {
        AccessTier::Basic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(
        positive: u32,
        total: u32,
        verifications: u32,
        age_days: i64,
    ) -> ReputationRecord {
        ReputationRecord {
            user_id: Uuid::new_v4(),
            score: 0.0,
            positive_transactions: positive,
            total_transactions: total,
            verification_count: verifications,
            account_age_days: age_days,
        }
    }

    #[test]
    fn test_established_user_reaches_full_tier() {
        // 40 days old, 3 of 4 positive, 2 verified types
        let rep = record(3, 4, 2, 40);
        let score = reputation_score(&rep);
        assert_eq!(score, 87.5);
        assert_eq!(access_tier(score, 2, 40), AccessTier::Full);
    }

    #[test]
    fn test_brand_new_user_is_basic() {
        let rep = record(0, 0, 0, 0);
        let score = reputation_score(&rep);
        assert_eq!(score, 0.0);
        assert_eq!(access_tier(score, 0, 0), AccessTier::Basic);
    }

    #[test]
    fn test_verification_score_caps_at_two_types() {
        let two = reputation_score(&record(0, 0, 2, 0));
        let four = reputation_score(&record(0, 0, 4, 0));
        assert_eq!(two, 25.0);
        assert_eq!(four, 25.0);
    }

    #[test]
    fn test_age_score_caps_at_thirty_days() {
        let month = reputation_score(&record(0, 0, 0, 30));
        let year = reputation_score(&record(0, 0, 0, 365));
        assert_eq!(month, 25.0);
        assert_eq!(year, 25.0);
    }

    #[test]
    fn test_negative_age_treated_as_zero() {
        let rep = record(0, 0, 0, -5);
        assert_eq!(reputation_score(&rep), 0.0);
    }

    #[test]
    fn test_standard_tier_thresholds() {
        assert_eq!(access_tier(25.0, 1, 15), AccessTier::Standard);
        assert_eq!(access_tier(24.9, 1, 15), AccessTier::Basic);
        assert_eq!(access_tier(25.0, 0, 15), AccessTier::Basic);
        assert_eq!(access_tier(25.0, 1, 14), AccessTier::Basic);
    }

    #[test]
    fn test_tier_ladder_is_monotonic() {
        let scores = [0.0, 24.9, 25.0, 49.9, 50.0, 87.5, 100.0];
        let counts = [0u32, 1, 2, 3, 4];
        let ages = [0i64, 14, 15, 29, 30, 120];

        // Increasing any one input while holding the others fixed never
        // lowers the tier.
        for &count in &counts {
            for &age in &ages {
                let mut prev = AccessTier::Basic;
                for &score in &scores {
                    let tier = access_tier(score, count, age);
                    assert!(tier >= prev, "tier regressed as score increased");
                    prev = tier;
                }
            }
        }
        for &score in &scores {
            for &age in &ages {
                let mut prev = AccessTier::Basic;
                for &count in &counts {
                    let tier = access_tier(score, count, age);
                    assert!(tier >= prev, "tier regressed as verified count increased");
                    prev = tier;
                }
            }
        }
        for &score in &scores {
            for &count in &counts {
                let mut prev = AccessTier::Basic;
                for &age in &ages {
                    let tier = access_tier(score, count, age);
                    assert!(tier >= prev, "tier regressed as account age increased");
                    prev = tier;
                }
            }
        }
    }
}
