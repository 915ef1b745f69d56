use leaveflow_db::{DemoSeedDataset, SeedResult};
use serde_json::json;

use crate::commands::{open_database, prepare, CommandResult, StepFailure};

pub fn run(year: i32) -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let loaded = DemoSeedDataset::load(&pool, year)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoSeedDataset::verify(&pool, year)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome: Result<SeedResult, StepFailure> = if verification.all_present {
            Ok(loaded)
        } else {
            let failed = failed_checks(&verification.checks);
            Err(("seed_verification", verification_message(&failed), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success_with_details(
            "seed",
            format!(
                "demo organisation seeded for {}: {} employees ({} HR), {} balances, {} blackout period(s)",
                seeded.year,
                seeded.employees,
                seeded.hr_employees,
                seeded.balances,
                seeded.blackout_periods
            ),
            Some(json!({
                "year": seeded.year,
                "employees": seeded.employees,
                "hr_employees": seeded.hr_employees,
                "balances": seeded.balances,
                "blackout_periods": seeded.blackout_periods,
            })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn failed_checks(checks: &[(&'static str, bool)]) -> Vec<&'static str> {
    checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect()
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed.join(", "))
    }
}
