//! Validation reporting structures.

use std::collections::HashMap;

use serde_json::Value;

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
    Skipped,
}

impl CheckStatus {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Warning => "warning",
            Self::Skipped => "skipped",
        }
    }
}

/// What part of the system a check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckCategory {
    Configuration,
    Llm,
    Registry,
    Agent,
    System,
    Database,
}

impl CheckCategory {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Llm => "llm",
            Self::Registry => "registry",
            Self::Agent => "agent",
            Self::System => "system",
            Self::Database => "database",
        }
    }
}

/// Result of one health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Check name.
    pub name: &'static str,
    /// Category the check belongs to.
    pub category: CheckCategory,
    /// Outcome.
    pub status: CheckStatus,
    /// Human-readable summary.
    pub message: String,
    /// Wall time the check took.
    pub duration_ms: u64,
    /// Optional structured detail.
    pub details: Option<Value>,
}

impl CheckResult {
    /// A passed result.
    pub fn passed(name: &'static str, category: CheckCategory, message: impl Into<String>) -> Self {
        Self::new(name, category, CheckStatus::Passed, message)
    }

    /// A failed result.
    pub fn failed(name: &'static str, category: CheckCategory, message: impl Into<String>) -> Self {
        Self::new(name, category, CheckStatus::Failed, message)
    }

    /// A warning result.
    pub fn warning(name: &'static str, category: CheckCategory, message: impl Into<String>) -> Self {
        Self::new(name, category, CheckStatus::Warning, message)
    }

    fn new(
        name: &'static str,
        category: CheckCategory,
        status: CheckStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name,
            category,
            status,
            message: message.into(),
            duration_ms: 0,
            details: None,
        }
    }

    /// Attach structured detail.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Complete validation report.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Every check result, in completion order.
    pub checks: Vec<CheckResult>,
    /// Per-category counts by status.
    pub summary: HashMap<CheckCategory, HashMap<CheckStatus, usize>>,
    /// Failures from checks in the critical set; any entry fails startup.
    pub critical_failures: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
    /// Generated advice derived from which categories failed.
    pub recommendations: Vec<String>,
    /// Total validation wall time.
    pub total_duration_ms: u64,
}

impl ValidationReport {
    /// Add a check result; `critical` marks whether a failure gates startup.
    pub fn add_check(&mut self, check: CheckResult, critical: bool) {
        let by_status = self.summary.entry(check.category).or_default();
        *by_status.entry(check.status).or_insert(0) = by_status
            .get(&check.status)
            .copied()
            .unwrap_or(0)
            .saturating_add(1);

        match check.status {
            CheckStatus::Failed if critical => self.critical_failures.push(format!(
                "{}: {} - {}",
                check.category.as_str(),
                check.name,
                check.message
            )),
            CheckStatus::Warning => self.warnings.push(format!(
                "{}: {} - {}",
                check.category.as_str(),
                check.name,
                check.message
            )),
            _ => {}
        }

        self.checks.push(check);
    }

    /// The process may come up iff this is true.
    pub fn is_healthy(&self) -> bool {
        self.critical_failures.is_empty()
    }

    /// Overall status: failed when any critical check failed.
    pub fn overall_status(&self) -> CheckStatus {
        if self.is_healthy() {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        }
    }

    /// Count of checks with a given status.
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// Whether any check in a category failed.
    pub fn category_failed(&self, category: CheckCategory) -> bool {
        self.checks
            .iter()
            .any(|c| c.category == category && c.status == CheckStatus::Failed)
    }

    /// Render the report for logs and the CLI.
    pub fn to_text(&self) -> String {
        let mut out = Vec::new();
        out.push("=".repeat(60));
        out.push("KICKAI STARTUP VALIDATION REPORT".to_owned());
        out.push("=".repeat(60));
        let overall = self.overall_status();
        let emoji = if self.is_healthy() { "✅" } else { "❌" };
        out.push(format!("{emoji} Overall status: {}", overall.as_str()));
        out.push(format!(
            "Checks: {} passed, {} failed, {} warnings ({} ms total)",
            self.count(CheckStatus::Passed),
            self.count(CheckStatus::Failed),
            self.count(CheckStatus::Warning),
            self.total_duration_ms,
        ));

        if !self.critical_failures.is_empty() {
            out.push(format!("Critical failures ({}):", self.critical_failures.len()));
            for failure in &self.critical_failures {
                out.push(format!("  • {failure}"));
            }
        }
        if !self.warnings.is_empty() {
            out.push(format!("Warnings ({}):", self.warnings.len()));
            for warning in &self.warnings {
                out.push(format!("  • {warning}"));
            }
        }
        if !self.recommendations.is_empty() {
            out.push(format!("Recommendations ({}):", self.recommendations.len()));
            for recommendation in &self.recommendations {
                out.push(format!("  • {recommendation}"));
            }
        }

        out.push(format!("Detailed results ({} checks):", self.checks.len()));
        for check in &self.checks {
            let emoji = match check.status {
                CheckStatus::Passed => "✅",
                CheckStatus::Failed => "❌",
                CheckStatus::Warning => "⚠️",
                CheckStatus::Skipped => "⏭",
            };
            out.push(format!(
                "  {emoji} {}:{} ({} ms) — {}",
                check.category.as_str(),
                check.name,
                check.duration_ms,
                check.message
            ));
        }
        out.push("=".repeat(60));
        out.join("\n")
    }
}
