//! Strategy configuration for the data-quality engine.
//!
//! A [`StrategyConfig`] is resolved once at pipeline start and shared
//! read-only by every stage. Per-column settings resolve with the
//! precedence column rule > column-type rule > default rule.

use crate::dataset::{ColumnSpec, ColumnType, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default IQR multiplier.
pub const DEFAULT_IQR_K: f64 = 1.5;

/// Default Z-score threshold.
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Upper bound on the configurable retry limit.
pub const MAX_RETRY_LIMIT: u32 = 10;

fn default_iqr_k() -> f64 {
    DEFAULT_IQR_K
}

fn default_z_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}

fn default_true() -> bool {
    true
}

/// Constant used by the `fill-constant` strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FillValue {
    /// Whether this constant can be stored in a column of the given type.
    pub fn fits(&self, column_type: ColumnType) -> bool {
        match self {
            Self::Bool(_) => column_type == ColumnType::Boolean,
            Self::Number(_) => column_type.is_numeric(),
            Self::Text(_) => column_type == ColumnType::Text,
        }
    }
}

/// Strategy for resolving missing entries in a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingStrategy {
    /// Replace missing entries with a constant.
    FillConstant(FillValue),
    /// Replace missing entries with the mean of the present values.
    FillMean,
    /// Replace missing entries with the median of the present values.
    FillMedian,
    /// Linear interpolation by row position between present neighbours.
    Interpolate,
    /// Remove every row with a missing entry in the column.
    DropRow,
    /// Remove the column.
    DropColumn,
}

impl MissingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FillConstant(_) => "fill-constant",
            Self::FillMean => "fill-mean",
            Self::FillMedian => "fill-median",
            Self::Interpolate => "interpolate",
            Self::DropRow => "drop-row",
            Self::DropColumn => "drop-column",
        }
    }

    /// Strategies that compute from numeric values.
    pub fn requires_numeric(&self) -> bool {
        matches!(self, Self::FillMean | Self::FillMedian | Self::Interpolate)
    }

    /// Whether the strategy can be applied to a column of the given type.
    pub fn fits(&self, column_type: ColumnType) -> bool {
        match self {
            Self::FillConstant(value) => value.fits(column_type),
            s => !s.requires_numeric() || column_type.is_numeric(),
        }
    }
}

/// Outlier detection method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Outside `[Q1 - k*IQR, Q3 + k*IQR]`.
    Iqr {
        #[serde(default = "default_iqr_k")]
        k: f64,
    },
    /// `|x - mean| / std > z_threshold`.
    Zscore {
        #[serde(default = "default_z_threshold")]
        z_threshold: f64,
    },
    /// Outside fixed domain bounds, e.g. "quantity must be positive".
    Range { min: Option<f64>, max: Option<f64> },
}

impl OutlierMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Iqr { .. } => "iqr",
            Self::Zscore { .. } => "zscore",
            Self::Range { .. } => "range",
        }
    }
}

impl Default for OutlierMethod {
    fn default() -> Self {
        Self::Iqr { k: DEFAULT_IQR_K }
    }
}

/// Remediation applied to a flagged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutlierAction {
    /// Remove the row.
    Drop,
    /// Replace with the nearest bound of the acceptable range.
    #[default]
    Clip,
    /// Replace with the median of the non-outlier values.
    ReplaceMedian,
}

impl OutlierAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Clip => "clip",
            Self::ReplaceMedian => "replace-median",
        }
    }
}

/// Detection method plus remediation for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutlierRule {
    #[serde(flatten)]
    pub method: OutlierMethod,
    #[serde(default)]
    pub action: OutlierAction,
}

impl OutlierRule {
    pub fn iqr(k: f64, action: OutlierAction) -> Self {
        Self {
            method: OutlierMethod::Iqr { k },
            action,
        }
    }

    pub fn zscore(z_threshold: f64, action: OutlierAction) -> Self {
        Self {
            method: OutlierMethod::Zscore { z_threshold },
            action,
        }
    }

    pub fn range(min: Option<f64>, max: Option<f64>, action: OutlierAction) -> Self {
        Self {
            method: OutlierMethod::Range { min, max },
            action,
        }
    }
}

/// Settings attached to a column, a column type, or every column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ColumnRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<MissingStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlier: Option<OutlierRule>,
    /// Exclude the column from missing-value and outlier handling.
    pub ignore: bool,
}

impl ColumnRule {
    pub fn missing(strategy: MissingStrategy) -> Self {
        Self {
            missing: Some(strategy),
            ..Self::default()
        }
    }

    pub fn outlier(rule: OutlierRule) -> Self {
        Self {
            outlier: Some(rule),
            ..Self::default()
        }
    }

    pub fn ignored() -> Self {
        Self {
            ignore: true,
            ..Self::default()
        }
    }

    pub fn with_missing(mut self, strategy: MissingStrategy) -> Self {
        self.missing = Some(strategy);
        self
    }

    pub fn with_outlier(mut self, rule: OutlierRule) -> Self {
        self.outlier = Some(rule);
        self
    }
}

/// The effective settings for one column after precedence is applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedRule {
    pub missing: Option<MissingStrategy>,
    pub outlier: Option<OutlierRule>,
}

/// Rule selecting the survivor of a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Highest value of the ordering column wins.
    MostRecent,
    /// Fewest missing values wins.
    #[default]
    MostComplete,
}

/// Deduplication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Columns forming the equality key. Empty means every declared column.
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub tiebreak: TieBreak,
    /// Ordering column for `most-recent`.
    #[serde(default)]
    pub order_column: Option<String>,
    /// Skip (instead of failing the stage) when a key column was dropped.
    #[serde(default = "default_true")]
    pub skip_if_key_missing: bool,
}

impl DedupConfig {
    pub fn new(key: Vec<String>, tiebreak: TieBreak) -> Self {
        Self {
            key,
            tiebreak,
            order_column: None,
            skip_if_key_missing: true,
        }
    }

    pub fn most_recent(key: Vec<String>, order_column: impl Into<String>) -> Self {
        Self {
            key,
            tiebreak: TieBreak::MostRecent,
            order_column: Some(order_column.into()),
            skip_if_key_missing: true,
        }
    }

    pub fn most_complete(key: Vec<String>) -> Self {
        Self::new(key, TieBreak::MostComplete)
    }
}

/// Severity of a validation failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    #[default]
    High,
    Critical,
}

/// Immutable configuration for one pipeline run.
///
/// # Example
///
/// ```rust,ignore
/// use sieve::config::*;
///
/// let config = StrategyConfig::builder()
///     .column_rule("price", ColumnRule::missing(MissingStrategy::FillMedian))
///     .dedup(DedupConfig::most_recent(vec!["id".into()], "ts"))
///     .retry_limit(2)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Rule for every column, applied field by field where it fits the
    /// column type and no column or type rule sets the field.
    pub defaults: ColumnRule,
    /// Rules per declared column type.
    pub types: BTreeMap<ColumnType, ColumnRule>,
    /// Rules per column name.
    pub columns: BTreeMap<String, ColumnRule>,

    /// Columns whose missing rate exceeds this fraction are dropped.
    /// Default: 0.7
    pub missing_rate_drop_threshold: f64,

    /// Deduplication settings; `None` disables the stage's work.
    pub dedup: Option<DedupConfig>,

    /// Minimum fraction of rows a stage must keep.
    /// Default: 0.5
    pub min_row_retention_fraction: f64,

    /// Post-stage missing-rate ceiling for columns with a missing strategy.
    /// Default: 0.0
    pub max_missing_rate_after: f64,

    /// Post-stage outlier-rate ceiling for columns with an outlier rule.
    /// Default: 0.05
    pub max_outlier_rate_after: f64,

    /// Retries per stage after the first attempt.
    /// Default: 2
    pub retry_limit: u32,

    /// Validation failures at or above this severity are stage-fatal.
    /// Default: high
    pub validation_severity_threshold: Severity,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let numeric = ColumnRule::missing(MissingStrategy::FillMedian)
            .with_outlier(OutlierRule::iqr(DEFAULT_IQR_K, OutlierAction::Clip));
        let mut types = BTreeMap::new();
        types.insert(ColumnType::Integer, numeric.clone());
        types.insert(ColumnType::Float, numeric);

        Self {
            defaults: ColumnRule::default(),
            types,
            columns: BTreeMap::new(),
            missing_rate_drop_threshold: 0.7,
            dedup: None,
            min_row_retention_fraction: 0.5,
            max_missing_rate_after: 0.0,
            max_outlier_rate_after: 0.05,
            retry_limit: 2,
            validation_severity_threshold: Severity::High,
        }
    }
}

impl StrategyConfig {
    /// Create a new configuration builder.
    pub fn builder() -> StrategyConfigBuilder {
        StrategyConfigBuilder::default()
    }

    /// A configuration with no rules at all; every stage becomes a no-op.
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
            ..Self::default()
        }
    }

    /// Resolve the effective rule for a column.
    pub fn rule_for(&self, spec: &ColumnSpec) -> ResolvedRule {
        let column = self.columns.get(&spec.name);
        if column.is_some_and(|rule| rule.ignore) {
            return ResolvedRule::default();
        }
        let by_type = self.types.get(&spec.column_type);
        if column.is_none() && by_type.is_some_and(|rule| rule.ignore) {
            return ResolvedRule::default();
        }

        // the global default only fills in what fits the column type
        let layers = [column, by_type];
        ResolvedRule {
            missing: layers
                .iter()
                .flatten()
                .find_map(|rule| rule.missing.clone())
                .or_else(|| {
                    self.defaults
                        .missing
                        .clone()
                        .filter(|strategy| strategy.fits(spec.column_type))
                }),
            outlier: layers
                .iter()
                .flatten()
                .find_map(|rule| rule.outlier.clone())
                .or_else(|| {
                    self.defaults
                        .outlier
                        .clone()
                        .filter(|_| spec.column_type.is_numeric())
                }),
        }
    }

    /// Validate thresholds and parameters.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let fractions = [
            ("missing_rate_drop_threshold", self.missing_rate_drop_threshold),
            ("min_row_retention_fraction", self.min_row_retention_fraction),
            ("max_missing_rate_after", self.max_missing_rate_after),
            ("max_outlier_rate_after", self.max_outlier_rate_after),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.retry_limit > MAX_RETRY_LIMIT {
            return Err(ConfigValidationError::RetryLimitTooHigh(self.retry_limit));
        }

        let rules = std::iter::once(("defaults".to_string(), &self.defaults))
            .chain(self.types.iter().map(|(t, r)| (format!("type {t}"), r)))
            .chain(self.columns.iter().map(|(c, r)| (format!("column {c}"), r)));
        for (scope, rule) in rules {
            if let Some(outlier) = &rule.outlier {
                validate_outlier_method(&scope, &outlier.method)?;
            }
        }

        if let Some(dedup) = &self.dedup
            && dedup.tiebreak == TieBreak::MostRecent
            && dedup.order_column.is_none()
        {
            return Err(ConfigValidationError::InvalidParameter {
                field: "dedup.order_column".to_string(),
                reason: "most-recent requires an ordering column".to_string(),
            });
        }

        Ok(())
    }

    /// Validate the configuration against the dataset a run starts with.
    pub fn validate_against(&self, dataset: &Dataset) -> Result<(), ConfigValidationError> {
        self.validate()?;

        for name in self.columns.keys() {
            if !dataset.has_column(name) {
                return Err(ConfigValidationError::UnknownColumn {
                    context: "column rule".to_string(),
                    column: name.clone(),
                });
            }
        }

        for spec in dataset.schema() {
            let rule = self.rule_for(spec);
            if let Some(strategy) = &rule.missing {
                if strategy.requires_numeric() && !spec.column_type.is_numeric() {
                    return Err(ConfigValidationError::TypeMismatch {
                        column: spec.name.clone(),
                        column_type: spec.column_type,
                        requirement: format!("{} needs a numeric column", strategy.name()),
                    });
                }
                if let MissingStrategy::FillConstant(value) = strategy
                    && !value.fits(spec.column_type)
                {
                    return Err(ConfigValidationError::TypeMismatch {
                        column: spec.name.clone(),
                        column_type: spec.column_type,
                        requirement: format!("fill-constant value {value:?} does not fit"),
                    });
                }
            }
            if let Some(outlier) = &rule.outlier
                && !spec.column_type.is_numeric()
            {
                return Err(ConfigValidationError::TypeMismatch {
                    column: spec.name.clone(),
                    column_type: spec.column_type,
                    requirement: format!("{} outlier detection needs a numeric column", outlier.method.name()),
                });
            }
        }

        if let Some(dedup) = &self.dedup {
            let referenced = dedup.key.iter().chain(dedup.order_column.iter());
            for name in referenced {
                if !dataset.has_column(name) {
                    return Err(ConfigValidationError::UnknownColumn {
                        context: "dedup".to_string(),
                        column: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn validate_outlier_method(scope: &str, method: &OutlierMethod) -> Result<(), ConfigValidationError> {
    match method {
        OutlierMethod::Iqr { k } if !(*k > 0.0 && k.is_finite()) => {
            Err(ConfigValidationError::InvalidParameter {
                field: format!("{scope}: outlier k"),
                reason: format!("{k} must be a positive number"),
            })
        }
        OutlierMethod::Zscore { z_threshold } if !(*z_threshold > 0.0 && z_threshold.is_finite()) => {
            Err(ConfigValidationError::InvalidParameter {
                field: format!("{scope}: outlier z_threshold"),
                reason: format!("{z_threshold} must be a positive number"),
            })
        }
        OutlierMethod::Range { min: None, max: None } => Err(ConfigValidationError::InvalidParameter {
            field: format!("{scope}: outlier range"),
            reason: "at least one of min or max is required".to_string(),
        }),
        OutlierMethod::Range {
            min: Some(min),
            max: Some(max),
        } if min > max => Err(ConfigValidationError::InvalidParameter {
            field: format!("{scope}: outlier range"),
            reason: format!("min {min} is greater than max {max}"),
        }),
        _ => Ok(()),
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Retry limit {0} exceeds the maximum of {MAX_RETRY_LIMIT}")]
    RetryLimitTooHigh(u32),

    #[error("{context} references unknown column '{column}'")]
    UnknownColumn { context: String, column: String },

    #[error("Column '{column}' ({column_type}): {requirement}")]
    TypeMismatch {
        column: String,
        column_type: ColumnType,
        requirement: String,
    },
}

/// Builder for [`StrategyConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct StrategyConfigBuilder {
    defaults: Option<ColumnRule>,
    types: BTreeMap<ColumnType, ColumnRule>,
    columns: BTreeMap<String, ColumnRule>,
    clear_type_defaults: bool,
    missing_rate_drop_threshold: Option<f64>,
    dedup: Option<DedupConfig>,
    min_row_retention_fraction: Option<f64>,
    max_missing_rate_after: Option<f64>,
    max_outlier_rate_after: Option<f64>,
    retry_limit: Option<u32>,
    validation_severity_threshold: Option<Severity>,
}

impl StrategyConfigBuilder {
    /// Set the rule applied to every column.
    pub fn default_rule(mut self, rule: ColumnRule) -> Self {
        self.defaults = Some(rule);
        self
    }

    /// Set the rule for every column of a declared type.
    pub fn type_rule(mut self, column_type: ColumnType, rule: ColumnRule) -> Self {
        self.types.insert(column_type, rule);
        self
    }

    /// Drop the built-in numeric type rules (fill-median, IQR clip).
    pub fn without_type_defaults(mut self) -> Self {
        self.clear_type_defaults = true;
        self
    }

    /// Set the rule for a single column.
    pub fn column_rule(mut self, column: impl Into<String>, rule: ColumnRule) -> Self {
        self.columns.insert(column.into(), rule);
        self
    }

    /// Set the threshold above which a column is dropped for missing data.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.7 = 70%)
    pub fn missing_rate_drop_threshold(mut self, threshold: f64) -> Self {
        self.missing_rate_drop_threshold = Some(threshold);
        self
    }

    /// Enable deduplication.
    pub fn dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Set the minimum fraction of rows each stage must retain.
    pub fn min_row_retention_fraction(mut self, fraction: f64) -> Self {
        self.min_row_retention_fraction = Some(fraction);
        self
    }

    /// Set the post-stage missing-rate ceiling.
    pub fn max_missing_rate_after(mut self, rate: f64) -> Self {
        self.max_missing_rate_after = Some(rate);
        self
    }

    /// Set the post-stage outlier-rate ceiling.
    pub fn max_outlier_rate_after(mut self, rate: f64) -> Self {
        self.max_outlier_rate_after = Some(rate);
        self
    }

    /// Set the number of retries per stage.
    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    /// Set the severity at which validation failures become stage-fatal.
    pub fn validation_severity_threshold(mut self, severity: Severity) -> Self {
        self.validation_severity_threshold = Some(severity);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `StrategyConfig` or an error if validation fails.
    pub fn build(self) -> Result<StrategyConfig, ConfigValidationError> {
        let base = StrategyConfig::default();
        let mut types = if self.clear_type_defaults {
            BTreeMap::new()
        } else {
            base.types
        };
        types.extend(self.types);

        let config = StrategyConfig {
            defaults: self.defaults.unwrap_or_default(),
            types,
            columns: self.columns,
            missing_rate_drop_threshold: self
                .missing_rate_drop_threshold
                .unwrap_or(base.missing_rate_drop_threshold),
            dedup: self.dedup,
            min_row_retention_fraction: self
                .min_row_retention_fraction
                .unwrap_or(base.min_row_retention_fraction),
            max_missing_rate_after: self
                .max_missing_rate_after
                .unwrap_or(base.max_missing_rate_after),
            max_outlier_rate_after: self
                .max_outlier_rate_after
                .unwrap_or(base.max_outlier_rate_after),
            retry_limit: self.retry_limit.unwrap_or(base.retry_limit),
            validation_severity_threshold: self
                .validation_severity_threshold
                .unwrap_or(base.validation_severity_threshold),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn dataset() -> Dataset {
        Dataset::from_frame(
            df![
                "id" => [1i64, 2, 3],
                "price" => [Some(1.0), None, Some(3.0)],
                "name" => ["a", "b", "c"],
            ]
            .unwrap(),
        )
    }

    #[test]
    fn test_default_config() {
        let config = StrategyConfig::default();
        assert_eq!(config.missing_rate_drop_threshold, 0.7);
        assert_eq!(config.retry_limit, 2);
        assert_eq!(config.validation_severity_threshold, Severity::High);
        assert!(config.dedup.is_none());
    }

    #[test]
    fn test_rule_precedence() {
        let config = StrategyConfig::builder()
            .default_rule(ColumnRule::missing(MissingStrategy::DropRow))
            .type_rule(
                ColumnType::Float,
                ColumnRule::missing(MissingStrategy::FillMean),
            )
            .column_rule("price", ColumnRule::missing(MissingStrategy::Interpolate))
            .build()
            .unwrap();

        let price = ColumnSpec::new("price", ColumnType::Float);
        let other_float = ColumnSpec::new("weight", ColumnType::Float);
        let text = ColumnSpec::new("name", ColumnType::Text);

        assert_eq!(
            config.rule_for(&price).missing,
            Some(MissingStrategy::Interpolate)
        );
        assert_eq!(
            config.rule_for(&other_float).missing,
            Some(MissingStrategy::FillMean)
        );
        assert_eq!(config.rule_for(&text).missing, Some(MissingStrategy::DropRow));
        // outlier falls through to the built-in float rule
        assert!(config.rule_for(&price).outlier.is_some());
    }

    #[test]
    fn test_default_rule_skips_incompatible_types() {
        let config = StrategyConfig::builder()
            .without_type_defaults()
            .default_rule(
                ColumnRule::missing(MissingStrategy::FillMean)
                    .with_outlier(OutlierRule::iqr(1.5, OutlierAction::Clip)),
            )
            .build()
            .unwrap();

        let text = config.rule_for(&ColumnSpec::new("name", ColumnType::Text));
        assert_eq!(text, ResolvedRule::default());
        let float = config.rule_for(&ColumnSpec::new("price", ColumnType::Float));
        assert_eq!(float.missing, Some(MissingStrategy::FillMean));
        assert!(float.outlier.is_some());
        assert!(config.validate_against(&dataset()).is_ok());
    }

    #[test]
    fn test_ignored_column_has_no_rule() {
        let config = StrategyConfig::builder()
            .column_rule("price", ColumnRule::ignored())
            .build()
            .unwrap();
        let rule = config.rule_for(&ColumnSpec::new("price", ColumnType::Float));
        assert_eq!(rule, ResolvedRule::default());
    }

    #[test]
    fn test_validation_invalid_threshold() {
        let result = StrategyConfig::builder()
            .missing_rate_drop_threshold(1.5)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_negative_k() {
        let result = StrategyConfig::builder()
            .column_rule(
                "price",
                ColumnRule::outlier(OutlierRule::iqr(-1.0, OutlierAction::Clip)),
            )
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn test_validation_most_recent_needs_order_column() {
        let result = StrategyConfig::builder()
            .dedup(DedupConfig::new(vec!["id".into()], TieBreak::MostRecent))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_against_unknown_column() {
        let config = StrategyConfig::builder()
            .column_rule("ghost", ColumnRule::missing(MissingStrategy::DropRow))
            .build()
            .unwrap();
        let err = config.validate_against(&dataset()).unwrap_err();
        assert!(matches!(err, ConfigValidationError::UnknownColumn { .. }));
    }

    #[test]
    fn test_validate_against_type_mismatch() {
        let config = StrategyConfig::builder()
            .column_rule("name", ColumnRule::missing(MissingStrategy::FillMean))
            .build()
            .unwrap();
        let err = config.validate_against(&dataset()).unwrap_err();
        assert!(matches!(err, ConfigValidationError::TypeMismatch { .. }));
    }

    #[test]
    fn test_validate_against_fill_constant_type() {
        let config = StrategyConfig::builder()
            .column_rule(
                "name",
                ColumnRule::missing(MissingStrategy::FillConstant(FillValue::Number(0.0))),
            )
            .build()
            .unwrap();
        assert!(config.validate_against(&dataset()).is_err());
    }

    #[test]
    fn test_validate_against_dedup_key() {
        let config = StrategyConfig::builder()
            .dedup(DedupConfig::most_complete(vec!["sku".into()]))
            .build()
            .unwrap();
        assert!(config.validate_against(&dataset()).is_err());

        let config = StrategyConfig::builder()
            .dedup(DedupConfig::most_complete(vec!["id".into()]))
            .build()
            .unwrap();
        assert!(config.validate_against(&dataset()).is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "types": { "float": { "missing": "fill-mean" } },
            "columns": {
                "qty": {
                    "missing": { "fill-constant": 0 },
                    "outlier": { "method": "range", "min": 1, "action": "drop" }
                },
                "price": { "outlier": { "method": "zscore", "action": "replace-median" } }
            },
            "missing_rate_drop_threshold": 0.5,
            "dedup": { "key": ["id"], "tiebreak": "most-recent", "order_column": "ts" },
            "retry_limit": 3,
            "validation_severity_threshold": "critical"
        }"#;

        let config: StrategyConfig = serde_json::from_str(json).expect("valid config");
        config.validate().unwrap();

        assert_eq!(config.missing_rate_drop_threshold, 0.5);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.validation_severity_threshold, Severity::Critical);
        assert_eq!(
            config.types[&ColumnType::Float].missing,
            Some(MissingStrategy::FillMean)
        );
        let qty = &config.columns["qty"];
        assert_eq!(
            qty.missing,
            Some(MissingStrategy::FillConstant(FillValue::Number(0.0)))
        );
        assert_eq!(
            qty.outlier,
            Some(OutlierRule::range(Some(1.0), None, OutlierAction::Drop))
        );
        assert_eq!(
            config.columns["price"].outlier,
            Some(OutlierRule::zscore(DEFAULT_Z_THRESHOLD, OutlierAction::ReplaceMedian))
        );
        let dedup = config.dedup.unwrap();
        assert_eq!(dedup.tiebreak, TieBreak::MostRecent);
        assert!(dedup.skip_if_key_missing);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }
}
