use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, VerificationError};

// Provider-native account record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_id: String,
    pub name: String,
    pub account_type: String,
    pub balance: Decimal,
}

// Provider-native transaction; deposits are positive amounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTransaction {
    pub transaction_id: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub description: String,
}

// Identity-owner records returned by the banking provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityOwner {
    pub names: Vec<String>,
    pub addresses: Vec<String>,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    RequiresCapture,
    Succeeded,
    Canceled,
    Failed,
}

// A minimal card authorization as reported by the payment processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    pub authorization_id: String,
    pub amount: Decimal,
    pub status: AuthorizationStatus,
    pub created: DateTime<Utc>,
}

impl PaymentAuthorization {
    pub fn is_authorized(&self) -> bool {
        matches!(
            self.status,
            AuthorizationStatus::Succeeded | AuthorizationStatus::RequiresCapture
        )
    }
}

// Banking-data provider: given an opaque access token, returns accounts,
// transaction history, and identity-owner records.
#[async_trait]
pub trait BankingProvider: Send + Sync {
    async fn get_accounts(&self, access_token: &str) -> Result<Vec<BankAccount>>;

    async fn get_transactions(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderTransaction>>;

    async fn get_identity(&self, access_token: &str) -> Result<Vec<IdentityOwner>>;

    async fn get_balance(&self, access_token: &str) -> Result<Decimal>;
}

// Payment-processor provider: can attach a payment method, attempt a
// minimal authorization against it, and list historical payment intents.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str)
        -> Result<()>;

    async fn create_verification_authorization(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        amount: Decimal,
    ) -> Result<PaymentAuthorization>;

    async fn cancel_authorization(&self, authorization_id: &str) -> Result<()>;

    async fn list_payment_intents(&self, customer_id: &str) -> Result<Vec<PaymentAuthorization>>;
}

// Caller-supplied credentials for one comprehensive verification run. A
// missing credential means that provider is skipped, not failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationCredentials {
    pub banking: Option<BankingCredentials>,
    pub processor: Option<ProcessorCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingCredentials {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorCredentials {
    pub customer_id: String,
    pub payment_method_id: String,
}

// Explicitly optional provider clients. The aggregator builds its task
// list only from clients that are present, so configuration absence never
// shows up as a runtime failure.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    banking: Option<Arc<dyn BankingProvider>>,
    processor: Option<Arc<dyn PaymentProcessor>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_banking(mut self, provider: Arc<dyn BankingProvider>) -> Self {
        self.banking = Some(provider);
        self
    }

    pub fn with_processor(mut self, provider: Arc<dyn PaymentProcessor>) -> Self {
        self.processor = Some(provider);
        self
    }

    pub fn banking(&self) -> Option<&Arc<dyn BankingProvider>> {
        self.banking.as_ref()
    }

    pub fn processor(&self) -> Option<&Arc<dyn PaymentProcessor>> {
        self.processor.as_ref()
    }
}

// Simulated banking provider backed by fixed data, for tests and the demo
// binary
pub struct SimulatedBankingProvider {
    accounts: Vec<BankAccount>,
    transactions: Vec<ProviderTransaction>,
    identity: Vec<IdentityOwner>,
}

impl SimulatedBankingProvider {
    pub fn new(
        accounts: Vec<BankAccount>,
        transactions: Vec<ProviderTransaction>,
        identity: Vec<IdentityOwner>,
    ) -> Self {
        SimulatedBankingProvider {
            accounts,
            transactions,
            identity,
        }
    }

    /// A healthy profile: an established checking account with biweekly
    /// salary deposits and identity on file.
    pub fn sample() -> Self {
        let now = Utc::now();
        let mut transactions = Vec::new();
        for i in 0..6 {
            transactions.push(ProviderTransaction {
                transaction_id: Uuid::new_v4().to_string(),
                amount: dec!(2150.00),
                date: now - Duration::days(14 * (i + 1)),
                description: "ACME PAYROLL".to_string(),
            });
        }
        for i in 0..10 {
            transactions.push(ProviderTransaction {
                transaction_id: Uuid::new_v4().to_string(),
                amount: dec!(-42.17) - Decimal::from(i),
                date: now - Duration::days(7 * (i + 1)),
                description: "GROCERY".to_string(),
            });
        }

        SimulatedBankingProvider::new(
            vec![BankAccount {
                account_id: "chk-001".to_string(),
                name: "Everyday Checking".to_string(),
                account_type: "checking".to_string(),
                balance: dec!(3421.55),
            }],
            transactions,
            vec![IdentityOwner {
                names: vec!["Jordan Reyes".to_string()],
                addresses: vec!["1 Main St, Springfield".to_string()],
                emails: vec!["jordan@example.com".to_string()],
                phone_numbers: vec!["+14155551234".to_string()],
            }],
        )
    }

    fn check_token(&self, access_token: &str) -> Result<()> {
        if access_token.is_empty() {
            return Err(VerificationError::ProviderFailure(
                "banking access token is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BankingProvider for SimulatedBankingProvider {
    async fn get_accounts(&self, access_token: &str) -> Result<Vec<BankAccount>> {
        self.check_token(access_token)?;
        Ok(self.accounts.clone())
    }

    async fn get_transactions(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderTransaction>> {
        self.check_token(access_token)?;
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.date >= start && t.date <= end)
            .cloned()
            .collect())
    }

    async fn get_identity(&self, access_token: &str) -> Result<Vec<IdentityOwner>> {
        self.check_token(access_token)?;
        Ok(self.identity.clone())
    }

    async fn get_balance(&self, access_token: &str) -> Result<Decimal> {
        self.check_token(access_token)?;
        Ok(self.accounts.iter().map(|a| a.balance).sum())
    }
}

// Simulated payment processor holding a mutable set of authorizations
pub struct SimulatedPaymentProcessor {
    authorize: bool,
    intents: RwLock<Vec<PaymentAuthorization>>,
}

impl SimulatedPaymentProcessor {
    pub fn new(authorize: bool, history: Vec<PaymentAuthorization>) -> Self {
        SimulatedPaymentProcessor {
            authorize,
            intents: RwLock::new(history),
        }
    }

    /// A customer with a year of monthly subscription charges that
    /// authorizes cleanly.
    pub fn sample() -> Self {
        let now = Utc::now();
        let history = (1..=12)
            .map(|i| PaymentAuthorization {
                authorization_id: Uuid::new_v4().to_string(),
                amount: dec!(29.99),
                status: AuthorizationStatus::Succeeded,
                created: now - Duration::days(30 * i),
            })
            .collect();
        SimulatedPaymentProcessor::new(true, history)
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn attach_payment_method(
        &self,
        _customer_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        if payment_method_id.is_empty() {
            return Err(VerificationError::ProviderFailure(
                "payment method id is empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_verification_authorization(
        &self,
        _customer_id: &str,
        _payment_method_id: &str,
        amount: Decimal,
    ) -> Result<PaymentAuthorization> {
        let auth = PaymentAuthorization {
            authorization_id: Uuid::new_v4().to_string(),
            amount,
            status: if self.authorize {
                AuthorizationStatus::RequiresCapture
            } else {
                AuthorizationStatus::Failed
            },
            created: Utc::now(),
        };
        self.intents.write().await.push(auth.clone());
        Ok(auth)
    }

    async fn cancel_authorization(&self, authorization_id: &str) -> Result<()> {
        let mut intents = self.intents.write().await;
        let auth = intents
            .iter_mut()
            .find(|a| a.authorization_id == authorization_id)
            .ok_or_else(|| {
                VerificationError::ProviderFailure(format!(
                    "unknown authorization: {}",
                    authorization_id
                ))
            })?;
        auth.status = AuthorizationStatus::Canceled;
        Ok(())
    }

    async fn list_payment_intents(&self, _customer_id: &str) -> Result<Vec<PaymentAuthorization>> {
        Ok(self.intents.read().await.clone())
    }
}
