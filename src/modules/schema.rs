use chrono::NaiveDate;
use derive_more::with_trait::Display;
use serde::{Deserialize, Serialize};

use crate::modules::types::Source;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FlagKind {
    Checkbox,
    Text,
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Date,
    MonthYear {
        #[serde(default = "min_year_default")]
        min_year: u16,
        #[serde(default = "max_year_default")]
        max_year: u16,
    },
    Select {
        options: Vec<String>,
    },
}

fn min_year_default() -> u16 {
    2000
}

fn max_year_default() -> u16 {
    2100
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlagSpec {
    pub flag: String,
    #[serde(default)]
    pub help: String,
    #[serde(flatten)]
    pub kind: FlagKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlagSchema {
    pub source: Source,
    pub flags: Vec<FlagSpec>,
}

/// `schemas.toml`: `[[schema]]` tables, one per source.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlagSchemas {
    #[serde(default)]
    pub schema: Vec<FlagSchema>,
}

fn checkbox(flag: &str, help: &str) -> FlagSpec {
    spec(flag, help, FlagKind::Checkbox)
}

fn number(flag: &str, help: &str, min: Option<f64>, max: Option<f64>) -> FlagSpec {
    spec(flag, help, FlagKind::Number { min, max })
}

fn spec(flag: &str, help: &str, kind: FlagKind) -> FlagSpec {
    FlagSpec {
        flag: flag.to_string(),
        help: help.to_string(),
        kind,
    }
}

impl FlagSchema {
    /// Flags understood by each crawler script.
    pub fn builtin(source: Source) -> Self {
        let flags = match source {
            Source::Leetcode => vec![
                checkbox("--init", "Initialize database"),
                checkbox("--full", "Fetch all problems"),
                checkbox("--daily", "Fetch daily challenge"),
                spec("--date", "Fetch daily challenge for a specific date", FlagKind::Date),
                spec(
                    "--monthly",
                    "Fetch monthly daily challenges",
                    FlagKind::MonthYear {
                        min_year: min_year_default(),
                        max_year: max_year_default(),
                    },
                ),
                checkbox("--fill-missing-content", "Fetch missing problem content only"),
                number(
                    "--fill-missing-content-workers",
                    "Concurrent workers for --fill-missing-content",
                    Some(1.0),
                    Some(32.0),
                ),
                checkbox("--missing-content-stats", "Show missing content count"),
            ],
            Source::Atcoder => vec![
                checkbox("--sync-kenkoooo", "Sync from Kenkoooo"),
                checkbox("--fetch-all", "Fetch all contests"),
                checkbox("--resume", "Resume from progress file"),
                spec("--contest", "Fetch a single contest", FlagKind::Text),
                checkbox("--status", "Show progress status"),
                checkbox("--fill-missing-content", "Fetch missing problem content"),
                checkbox("--missing-content-stats", "Show missing content count"),
                checkbox("--reprocess-content", "Reprocess problem content"),
                number("--rate-limit", "Rate limit in seconds", Some(0.0), None),
            ],
            Source::Codeforces => vec![
                checkbox("--sync-problemset", "Sync from Codeforces problemset API"),
                checkbox("--fetch-all", "Fetch all contests"),
                checkbox("--resume", "Resume from progress file"),
                checkbox("--include-gym", "Include gym contests in contest list"),
                number("--contest", "Fetch a single contest by ID", Some(1.0), None),
                checkbox("--status", "Show progress status"),
                checkbox("--fill-missing-content", "Fetch missing problem content"),
                checkbox("--missing-content-stats", "Show missing content count"),
                checkbox("--missing-problems", "Print IDs of problems missing content"),
                checkbox("--reprocess-content", "Reprocess problem content"),
                number("--rate-limit", "Seconds between requests", Some(0.0), None),
            ],
            Source::Luogu => vec![
                checkbox("--sync", "Sync problem list"),
                checkbox("--fill-missing-content", "Fetch content for problems missing it"),
                checkbox("--missing-content-stats", "Show missing content count"),
                checkbox("--status", "Show sync status"),
                checkbox("--overwrite", "Overwrite existing problems instead of skipping"),
                number("--rate-limit", "Seconds between requests", Some(1.0), None),
                number("--batch-size", "DB write batch size for content sync", Some(1.0), None),
            ],
        };
        Self { source, flags }
    }
}

/// Schemas in use, built-ins unless a loaded file overrides a source.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<FlagSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self {
            schemas: Source::ALL.into_iter().map(FlagSchema::builtin).collect(),
        }
    }
}

impl SchemaRegistry {
    pub fn with_overrides(overrides: FlagSchemas) -> Self {
        let mut registry = Self::default();
        for schema in overrides.schema {
            match registry.schemas.iter_mut().find(|s| s.source == schema.source) {
                Some(existing) => *existing = schema,
                None => registry.schemas.push(schema),
            }
        }
        registry
    }

    pub fn get(&self, source: Source) -> FlagSchema {
        self.schemas
            .iter()
            .find(|schema| schema.source == source)
            .cloned()
            .unwrap_or(FlagSchema {
                source,
                flags: Vec::new(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ArgsError {
    #[display("{flag} needs a value")]
    Missing { flag: String },
    #[display("{flag}: {reason}")]
    Invalid { flag: String, reason: String },
}

/// State of one schema row. `value` is the main input (the year for a
/// month-year flag); `month` is only used by month-year flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagInput {
    pub enabled: bool,
    pub value: String,
    pub month: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputView {
    pub name: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub disabled: bool,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub flag: String,
    pub help: String,
    pub checked: bool,
    pub inputs: Vec<InputView>,
}

/// The crawler argument form. Rendering and serialization both walk the
/// same schema rows, so markup order and token order cannot drift apart.
#[derive(Debug, Clone)]
pub struct ArgumentForm {
    schema: FlagSchema,
    inputs: Vec<FlagInput>,
}

impl ArgumentForm {
    pub fn new(schema: FlagSchema) -> Self {
        let inputs = vec![FlagInput::default(); schema.flags.len()];
        Self { schema, inputs }
    }

    pub fn schema(&self) -> &FlagSchema {
        &self.schema
    }

    fn input_mut(&mut self, flag: &str) -> Option<&mut FlagInput> {
        let index = self.schema.flags.iter().position(|f| f.flag == flag)?;
        self.inputs.get_mut(index)
    }

    pub fn set_enabled(&mut self, flag: &str, enabled: bool) -> bool {
        self.input_mut(flag).map(|input| input.enabled = enabled).is_some()
    }

    pub fn set_value(&mut self, flag: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        self.input_mut(flag).map(|input| input.value = value).is_some()
    }

    pub fn set_month_year(
        &mut self,
        flag: &str,
        year: impl Into<String>,
        month: impl Into<String>,
    ) -> bool {
        let (year, month) = (year.into(), month.into());
        self.input_mut(flag)
            .map(|input| {
                input.value = year;
                input.month = month;
            })
            .is_some()
    }

    pub fn fields(&self) -> Vec<FieldView> {
        self.schema
            .flags
            .iter()
            .zip(&self.inputs)
            .map(|(spec, input)| {
                let disabled = !input.enabled;
                let field = |name, input_type, value: &str, options: Vec<String>| InputView {
                    name,
                    input_type,
                    value: value.to_string(),
                    disabled,
                    options,
                };
                let inputs = match &spec.kind {
                    FlagKind::Checkbox => Vec::new(),
                    FlagKind::Text => vec![field("value", "text", &input.value, Vec::new())],
                    FlagKind::Number { .. } => {
                        vec![field("value", "number", &input.value, Vec::new())]
                    }
                    FlagKind::Date => vec![field("value", "date", &input.value, Vec::new())],
                    FlagKind::MonthYear { .. } => vec![
                        field("year", "number", &input.value, Vec::new()),
                        field("month", "number", &input.month, Vec::new()),
                    ],
                    FlagKind::Select { options } => {
                        vec![field("value", "select", &input.value, options.clone())]
                    }
                };
                FieldView {
                    flag: spec.flag.clone(),
                    help: spec.help.clone(),
                    checked: input.enabled,
                    inputs,
                }
            })
            .collect()
    }

    /// Enabled flags in schema order, each followed by its value tokens.
    pub fn build_args(&self) -> Result<Vec<String>, ArgsError> {
        let mut args = Vec::new();
        for (spec, input) in self.schema.flags.iter().zip(&self.inputs) {
            if !input.enabled {
                continue;
            }
            args.push(spec.flag.clone());
            args.extend(value_tokens(spec, input)?);
        }
        Ok(args)
    }
}

fn required(flag: &str, value: &str) -> Result<String, ArgsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ArgsError::Missing {
            flag: flag.to_string(),
        });
    }
    Ok(value.to_string())
}

fn invalid(flag: &str, reason: impl Into<String>) -> ArgsError {
    ArgsError::Invalid {
        flag: flag.to_string(),
        reason: reason.into(),
    }
}

fn value_tokens(spec: &FlagSpec, input: &FlagInput) -> Result<Vec<String>, ArgsError> {
    let flag = spec.flag.as_str();
    match &spec.kind {
        FlagKind::Checkbox => Ok(Vec::new()),
        FlagKind::Text => Ok(vec![required(flag, &input.value)?]),
        FlagKind::Number { min, max } => {
            let value = required(flag, &input.value)?;
            let number: f64 = value.parse().map_err(|_| invalid(flag, "not a number"))?;
            if min.is_some_and(|min| number < min) || max.is_some_and(|max| number > max) {
                return Err(invalid(
                    flag,
                    format!(
                        "must be between {} and {}",
                        min.map_or("-inf".to_string(), |v| v.to_string()),
                        max.map_or("inf".to_string(), |v| v.to_string())
                    ),
                ));
            }
            Ok(vec![value])
        }
        FlagKind::Date => {
            let value = required(flag, &input.value)?;
            if value.len() != 10 || NaiveDate::parse_from_str(&value, "%Y-%m-%d").is_err() {
                return Err(invalid(flag, "expected a YYYY-MM-DD calendar date"));
            }
            Ok(vec![value])
        }
        FlagKind::MonthYear { min_year, max_year } => {
            let year = required(flag, &input.value)?;
            let month = required(flag, &input.month)?;
            let year_number: u16 = year.parse().map_err(|_| invalid(flag, "invalid year"))?;
            let month_number: u8 = month.parse().map_err(|_| invalid(flag, "invalid month"))?;
            if !(*min_year..=*max_year).contains(&year_number) {
                return Err(invalid(
                    flag,
                    format!("year must be between {min_year} and {max_year}"),
                ));
            }
            if !(1..=12).contains(&month_number) {
                return Err(invalid(flag, "month must be between 1 and 12"));
            }
            Ok(vec![year_number.to_string(), month_number.to_string()])
        }
        FlagKind::Select { options } => {
            let value = required(flag, &input.value)?;
            if !options.contains(&value) {
                return Err(invalid(flag, format!("must be one of {}", options.join(", "))));
            }
            Ok(vec![value])
        }
    }
}
