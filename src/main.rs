use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;

use trust_engine::config::{self, Config};
use trust_engine::handlers::HandlerRegistry;
use trust_engine::models::{User, VerificationType};
use trust_engine::providers::{
    BankingCredentials, ProcessorCredentials, ProviderRegistry, SimulatedBankingProvider,
    SimulatedPaymentProcessor, VerificationCredentials,
};
use trust_engine::store::MemoryStore;
use trust_engine::utils;
use trust_engine::{ComprehensiveVerifier, VerificationOrchestrator};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a demo user through document and phone verification
    VerifyFlow,

    /// Run comprehensive multi-provider verification for a demo user
    Comprehensive,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    utils::logging::init_logger(&config.log_level);

    let cli = Cli::parse();

    match cli.command {
        Command::VerifyFlow => {
            info!("Starting verification flow demo...");
            run_verify_flow(&config).await?;
        }
        Command::Comprehensive => {
            info!("Starting comprehensive verification demo...");
            run_comprehensive(&config).await?;
        }
    }

    Ok(())
}

/// Simulated providers stand in for live integrations; a provider is
/// wired only when its API key is configured, so the demo exercises the
/// same availability gating as production wiring would.
fn build_providers(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    if config.banking_api_key.is_some() {
        registry = registry.with_banking(Arc::new(SimulatedBankingProvider::sample()));
    }
    if config.processor_api_key.is_some() {
        registry = registry.with_processor(Arc::new(SimulatedPaymentProcessor::sample()));
    }
    registry
}

async fn seed_demo_user(store: &MemoryStore) -> Result<User> {
    // Backdated so account age contributes to the reputation score
    let user = User {
        id: uuid::Uuid::new_v4(),
        created_at: Utc::now() - Duration::days(45),
    };
    store.add_user(user.clone()).await?;
    Ok(user)
}

async fn run_verify_flow(config: &Config) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let user = seed_demo_user(&store).await?;

    let orchestrator = VerificationOrchestrator::new(
        store.clone(),
        HandlerRegistry::with_defaults(),
        build_providers(config),
        config.provider_timeout(),
    );

    let submissions = vec![
        (
            VerificationType::GovernmentId,
            json!({
                "document_type": "passport",
                "document_number": "X1234567",
                "expiry_date": "2031-06-01",
            }),
        ),
        (
            VerificationType::UtilityBill,
            json!({
                "bill_type": "electricity",
                "issue_date": (Utc::now() - Duration::days(12)).to_rfc3339(),
                "address": "1 Main St, Springfield",
            }),
        ),
        (
            VerificationType::PhoneNumber,
            json!({
                "phone_number": "+14155551234",
                "code": "482913",
                "expected_code": "482913",
            }),
        ),
    ];

    for (verification_type, data) in submissions {
        let result = orchestrator.verify_user(user.id, verification_type, data).await?;
        println!(
            "{:?}: {} ({})",
            verification_type,
            if result.success { "VERIFIED" } else { "REJECTED" },
            result.message
        );
    }

    let summary = orchestrator.get_user_verification_status(user.id).await?;
    let tier = orchestrator.get_user_access_tier(user.id).await?;
    println!("verified methods: {:?}", summary.verified);
    println!("access tier: {:?}", tier);

    Ok(())
}

async fn run_comprehensive(config: &Config) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let user = seed_demo_user(&store).await?;

    let verifier = ComprehensiveVerifier::new(
        store.clone(),
        build_providers(config),
        config.provider_timeout(),
    );

    let credentials = VerificationCredentials {
        banking: config.banking_api_key.as_ref().map(|_| BankingCredentials {
            access_token: "demo-access-token".to_string(),
        }),
        processor: config.processor_api_key.as_ref().map(|_| ProcessorCredentials {
            customer_id: "cus_demo".to_string(),
            payment_method_id: "pm_demo".to_string(),
        }),
    };

    let result = verifier
        .perform_comprehensive_verification(user.id, &credentials)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        println!(
            "no provider produced an assessment; set BANKING_API_KEY and/or PROCESSOR_API_KEY"
        );
    }

    Ok(())
}
