//! Diagnostic tool - Check configuration and data readiness
//!
//! Run with: cargo run --bin diagnose [fixture.json]

use std::env;
use std::path::Path;

use vaultlens::config::Config;
use vaultlens::scheduler::{Dashboard, DashboardOptions, Topic, TopicState};
use vaultlens::sources::Fixture;

#[tokio::main]
async fn main() {
    println!("🔍 VAULTLENS DIAGNOSTIC CHECK\n");

    // Load .env
    dotenvy::dotenv().ok();

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    // Key settings
    let checks = [
        ("API_URL", "https://api.beefy.finance", "Vault/price/APY API"),
        ("FIXTURE_PATH", "(none)", "Replay a JSON fixture instead"),
        ("TIME_BUCKET_SECS", "60", "Granularity of time-dependent figures"),
        ("REFRESH_INTERVAL_SECS", "60", "Seconds between refreshes in watch mode"),
        ("DEFAULT_SORT", "default", "Initial listing order"),
        ("SNAPSHOT_LOG", "false", "Append a JSON line per refresh?"),
    ];

    for (key, default, desc) in checks {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        let is_default = env::var(key).is_err();
        let marker = if is_default { "(default)" } else { "(from .env)" };
        println!("  {}: {} {}", key, value, marker);
        println!("    └─ {}\n", desc);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Failed to load config: {}", e);
            return;
        }
    };

    println!("═══════════════════════════════════════════════════");
    println!("                    VALIDATION                      ");
    println!("═══════════════════════════════════════════════════\n");

    match config.validate() {
        Ok(()) => println!("  ✅ Configuration valid"),
        Err(e) => println!("  ❌ {}", e),
    }
    match config.wallet() {
        Ok(Some(address)) => println!("  WALLET_ADDRESS: ✅ {}", address),
        Ok(None) => println!("  WALLET_ADDRESS: ⚪ Not set (balances unavailable)"),
        Err(e) => println!("  WALLET_ADDRESS: ❌ {}", e),
    }
    println!(
        "  Boost-like campaign rules: {}",
        config.boost_like_campaigns.len()
    );

    // Fixture readiness: which topics would be able to run
    let fixture_path = env::args().nth(1).or_else(|| config.fixture_path.clone());
    let Some(path) = fixture_path else {
        println!("\n  (pass a fixture path to check topic readiness)");
        println!("\n✅ Diagnostic complete!\n");
        return;
    };

    println!("\n═══════════════════════════════════════════════════");
    println!("                 TOPIC READINESS                    ");
    println!("═══════════════════════════════════════════════════\n");

    if !Path::new(&path).exists() {
        println!("  ❌ Fixture {} not found", path);
        return;
    }
    let fixture = match Fixture::from_file(&path) {
        Ok(fixture) => fixture,
        Err(e) => {
            println!("  ❌ {:#}", e);
            return;
        }
    };

    let dashboard = Dashboard::start(DashboardOptions::from_config(
        &config,
        fixture.now.unwrap_or(0),
    ));
    fixture.deliver(&dashboard.events(), vec![]);
    let settled = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        dashboard.settled(),
    )
    .await
    .is_ok();

    let derived = dashboard.derived();
    for topic in Topic::ALL {
        let published = match topic {
            Topic::TotalApy => derived.apy.is_some(),
            Topic::AvgApy => derived.avg_apy.is_some(),
            Topic::Balance => derived.balances.is_some(),
            Topic::Tvl => derived.tvl.is_some(),
            Topic::Filters => derived.filtered.is_some(),
        };
        let marker = match (published, dashboard.topic_state(topic)) {
            (true, _) => "✅ Published",
            (false, TopicState::Waiting) => "⏳ Waiting on missing data",
            (false, _) => "❓ Not run",
        };
        println!("  {:<10} {}", topic.name(), marker);
        if let Some(err) = derived.errors.get(topic.name()) {
            println!("    └─ ❌ {}", err);
        }
    }
    if !settled {
        println!("\n  ⚠️  Topics did not settle within 10s");
    }
    dashboard.shutdown();

    println!("\n✅ Diagnostic complete!\n");
}
