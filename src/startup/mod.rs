//! The startup validator — the pre-serve gate.
//!
//! Runs the closed check list concurrently (checks that declare a
//! dependency run sequentially afterwards, in declaration order), converts
//! panics and errors inside a check into failed results, records per-check
//! wall time, and produces a [`ValidationReport`] with per-category counts
//! and generated recommendations. The process refuses traffic when any
//! critical check failed; the exit code reflects only this outcome.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

pub mod checks;
pub mod report;

pub use checks::{default_checks, CheckContext, StartupCheck};
pub use report::{CheckCategory, CheckResult, CheckStatus, ValidationReport};

/// Checks slower than this generate a recommendation.
const SLOW_CHECK_MS: u64 = 5_000;

/// Orchestrates the health checks.
pub struct StartupValidator {
    checks: Vec<Arc<dyn StartupCheck>>,
}

impl Default for StartupValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupValidator {
    /// Create a validator with the default check list.
    pub fn new() -> Self {
        Self {
            checks: default_checks(),
        }
    }

    /// Create a validator with a custom check list (for tests).
    pub fn with_checks(checks: Vec<Arc<dyn StartupCheck>>) -> Self {
        Self { checks }
    }

    /// Add a custom check.
    pub fn add_check(&mut self, check: Arc<dyn StartupCheck>) {
        self.checks.push(check);
    }

    /// Run every check and build the report.
    pub async fn validate(&self, ctx: Arc<CheckContext>) -> ValidationReport {
        let started = Instant::now();
        info!(checks = self.checks.len(), "startup validation beginning");

        let mut report = ValidationReport::default();

        // Independent checks run concurrently; dependent ones wait.
        let (independent, dependent): (Vec<_>, Vec<_>) = self
            .checks
            .iter()
            .cloned()
            .partition(|c| c.depends_on().is_none());

        let mut handles = Vec::with_capacity(independent.len());
        for check in independent {
            let ctx = Arc::clone(&ctx);
            let critical = check.critical();
            let name = check.name();
            let category = check.category();
            handles.push((
                name,
                category,
                critical,
                tokio::spawn(async move { run_one(check.as_ref(), &ctx, &[]).await }),
            ));
        }

        for (name, category, critical, handle) in handles {
            match handle.await {
                Ok(result) => report.add_check(result, critical),
                Err(e) => {
                    // A panic inside a check becomes a failed result, never
                    // an aborted run.
                    error!(check = name, error = %e, "check task panicked");
                    report.add_check(
                        CheckResult::failed(name, category, format!("check panicked: {e}")),
                        critical,
                    );
                }
            }
        }

        // Dependent checks see the completed results of the first wave and
        // run in declaration order (the validator enforces the partial
        // order).
        for check in dependent {
            let critical = check.critical();
            let prior = report.checks.clone();
            let result = run_one(check.as_ref(), &ctx, &prior).await;
            report.add_check(result, critical);
        }

        self.generate_recommendations(&mut report);
        report.total_duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            checks = report.checks.len(),
            failures = report.critical_failures.len(),
            duration_ms = report.total_duration_ms,
            "startup validation finished"
        );
        report
    }

    fn generate_recommendations(&self, report: &mut ValidationReport) {
        let mut recommendations = Vec::new();

        if report.category_failed(CheckCategory::Configuration) {
            recommendations
                .push("Review and fix configuration issues before proceeding".to_owned());
        }
        if report.category_failed(CheckCategory::Llm) {
            recommendations.push("Verify LLM provider configuration and API keys".to_owned());
        }
        if report.category_failed(CheckCategory::Database) {
            recommendations.push("Check database connectivity and credentials".to_owned());
        }
        if report.category_failed(CheckCategory::Agent) {
            recommendations.push("Review agent configuration and tool setup".to_owned());
        }
        if report.category_failed(CheckCategory::Registry) {
            recommendations
                .push("Review registry initialization and the registration manifest".to_owned());
        }

        if !report.critical_failures.is_empty() {
            recommendations
                .push("Address critical failures before starting the application".to_owned());
        }
        if !report.warnings.is_empty() {
            recommendations
                .push("Review warnings to ensure optimal system performance".to_owned());
        }

        let slow: Vec<&str> = report
            .checks
            .iter()
            .filter(|c| c.duration_ms > SLOW_CHECK_MS)
            .map(|c| c.name)
            .collect();
        if !slow.is_empty() {
            recommendations.push(format!(
                "Consider optimizing slow checks for better startup performance: {}",
                slow.join(", ")
            ));
        }

        report.recommendations = recommendations;
    }
}

/// Run a single check with timing; the check's own errors are already
/// results.
async fn run_one(
    check: &dyn StartupCheck,
    ctx: &CheckContext,
    prior: &[CheckResult],
) -> CheckResult {
    let started = Instant::now();
    let mut result = check.execute(ctx, prior).await;
    result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        check = result.name,
        status = result.status.as_str(),
        duration_ms = result.duration_ms,
        "check completed"
    );
    result
}
