use crate::config::{Severity, StrategyConfig};
use crate::dataset::Dataset;
use crate::outliers::detection::count_outliers;
use crate::types::{StageKind, ValidationCheck, ValidationOutcome};
use tracing::debug;

/// Which post-stage ceilings apply.
///
/// A ceiling is only meaningful once the stage that resolves it has run:
/// the missing-rate ceiling after missing-value resolution, the outlier-rate
/// ceiling after outlier resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationScope {
    pub missing_rate: bool,
    pub outlier_rate: bool,
}

impl ValidationScope {
    /// Scope after the given stages have run, in any order.
    pub fn after<'a>(stages: impl IntoIterator<Item = &'a StageKind>) -> Self {
        let mut scope = Self::default();
        for stage in stages {
            match stage {
                StageKind::MissingValues => scope.missing_rate = true,
                StageKind::Outliers => scope.outlier_rate = true,
                _ => {}
            }
        }
        scope
    }
}

/// Cross validator.
pub struct CrossValidator;

impl CrossValidator {
    /// Run every check, in order: structure, row retention, then the
    /// per-column ceilings in scope.
    pub fn validate(
        before: &Dataset,
        after: &Dataset,
        stage: StageKind,
        attempt: u32,
        scope: ValidationScope,
        config: &StrategyConfig,
    ) -> Vec<ValidationOutcome> {
        let outcome = |check: ValidationCheck,
                       column: Option<&str>,
                       passed: bool,
                       observed: f64,
                       limit: f64,
                       message: String| ValidationOutcome {
            stage,
            attempt,
            check,
            column: column.map(String::from),
            passed,
            severity: check.severity(),
            observed,
            limit,
            message,
        };
        let mut outcomes = Vec::new();

        // (a) structure
        let structure = after.check_structure();
        outcomes.push(outcome(
            ValidationCheck::Structure,
            None,
            structure.is_ok(),
            if structure.is_ok() { 1.0 } else { 0.0 },
            1.0,
            structure.err().unwrap_or_else(|| "declared columns present".to_string()),
        ));

        // (b) row retention
        let retained = if before.height() == 0 {
            1.0
        } else {
            after.height() as f64 / before.height() as f64
        };
        let floor = config.min_row_retention_fraction;
        outcomes.push(outcome(
            ValidationCheck::RowRetention,
            None,
            retained >= floor,
            retained,
            floor,
            format!(
                "kept {} of {} rows ({:.1}%, minimum {:.1}%)",
                after.height(),
                before.height(),
                retained * 100.0,
                floor * 100.0
            ),
        ));

        if after.height() == 0 {
            return outcomes;
        }

        // (c) statistical ceilings
        for spec in after.schema() {
            let rule = config.rule_for(spec);

            if scope.missing_rate && rule.missing.is_some() {
                let missing = after.missing_count(&spec.name).unwrap_or(0);
                let rate = missing as f64 / after.height() as f64;
                let limit = config.max_missing_rate_after;
                outcomes.push(outcome(
                    ValidationCheck::MissingRate,
                    Some(&spec.name),
                    rate <= limit,
                    rate,
                    limit,
                    format!("{missing} missing entries in '{}'", spec.name),
                ));
            }

            if scope.outlier_rate
                && spec.column_type.is_numeric()
                && let Some(outlier) = &rule.outlier
                && let Ok(values) = after.numeric_values(&spec.name)
            {
                let present = values.iter().flatten().count();
                let flagged = count_outliers(&values, &outlier.method);
                let rate = if present == 0 {
                    0.0
                } else {
                    flagged as f64 / present as f64
                };
                let limit = config.max_outlier_rate_after;
                outcomes.push(outcome(
                    ValidationCheck::OutlierRate,
                    Some(&spec.name),
                    rate <= limit,
                    rate,
                    limit,
                    format!("{flagged} outliers remain in '{}'", spec.name),
                ));
            }
        }

        for failed in outcomes.iter().filter(|o| !o.passed) {
            debug!(
                "{} check {:?} failed ({:?}): {}",
                stage, failed.check, failed.severity, failed.message
            );
        }
        outcomes
    }

    /// Failures at or above the severity threshold.
    pub fn escalating(outcomes: &[ValidationOutcome], threshold: Severity) -> Vec<&ValidationOutcome> {
        outcomes
            .iter()
            .filter(|o| !o.passed && o.severity >= threshold)
            .collect()
    }
}
