//! Condition model: atomic predicates over a snapshot and their AND/OR sets.
//!
//! - `Condition`: numeric comparison, category membership, tag inclusion and
//!   exclusion, symbol allow/deny
//! - `ConditionSet`: an ordered list of conditions joined by one `Logic`
//! - `EmptyPolicy`: what an empty set means, chosen by the caller

use std::fmt;

use crate::domain::error::SigtraderError;
use crate::domain::snapshot::{NumericField, Tag};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    Between { min: f64, max: f64 },
}

impl Comparison {
    pub fn holds(&self, value: f64) -> bool {
        match *self {
            Comparison::Gt(v) => value > v,
            Comparison::Gte(v) => value >= v,
            Comparison::Lt(v) => value < v,
            Comparison::Lte(v) => value <= v,
            Comparison::Between { min, max } => value >= min && value <= max,
        }
    }

    /// Inclusive lower/upper bounds implied by the comparison.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match *self {
            Comparison::Gt(v) | Comparison::Gte(v) => (Some(v), None),
            Comparison::Lt(v) | Comparison::Lte(v) => (None, Some(v)),
            Comparison::Between { min, max } => (Some(min), Some(max)),
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Comparison::Gt(_) => "GT",
            Comparison::Gte(_) => "GTE",
            Comparison::Lt(_) => "LT",
            Comparison::Lte(_) => "LTE",
            Comparison::Between { .. } => "BETWEEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryField {
    Market,
    Industry,
    Other(String),
}

impl CategoryField {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "market" => CategoryField::Market,
            "industry" => CategoryField::Industry,
            _ => CategoryField::Other(name.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Numeric {
        field: NumericField,
        cmp: Comparison,
    },
    Category {
        field: CategoryField,
        values: Vec<String>,
    },
    Tags {
        include_any: Vec<Tag>,
        include_all: Vec<Tag>,
        exclude_any: Vec<Tag>,
    },
    Symbols {
        include: Vec<String>,
        exclude: Vec<String>,
    },
}

impl Condition {
    pub fn numeric(field: NumericField, cmp: Comparison) -> Self {
        Condition::Numeric { field, cmp }
    }

    pub fn market<S: AsRef<str>>(values: &[S]) -> Self {
        Condition::Category {
            field: CategoryField::Market,
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
        }
    }

    pub fn industry<S: AsRef<str>>(values: &[S]) -> Self {
        Condition::Category {
            field: CategoryField::Industry,
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        match self {
            Condition::Numeric { field, cmp } => {
                if field.name().is_empty() {
                    return Err(SigtraderError::validation("numeric condition missing field"));
                }
                let (lo, hi) = cmp.bounds();
                if lo.is_some_and(|v| !v.is_finite()) || hi.is_some_and(|v| !v.is_finite()) {
                    return Err(SigtraderError::validation(format!(
                        "numeric condition on {} has a non-finite bound",
                        field
                    )));
                }
                if let Comparison::Between { min, max } = cmp {
                    if min > max {
                        return Err(SigtraderError::validation(format!(
                            "BETWEEN on {} has min {} above max {}",
                            field, min, max
                        )));
                    }
                }
                Ok(())
            }
            Condition::Category { field, values } => {
                if matches!(field, CategoryField::Other(name) if name.is_empty()) {
                    return Err(SigtraderError::validation("category condition missing field"));
                }
                if values.iter().all(|v| v.trim().is_empty()) {
                    return Err(SigtraderError::validation(
                        "category condition requires at least one value",
                    ));
                }
                Ok(())
            }
            Condition::Tags {
                include_any,
                include_all,
                exclude_any,
            } => {
                if include_any.is_empty() && include_all.is_empty() && exclude_any.is_empty() {
                    return Err(SigtraderError::validation(
                        "tags condition requires at least one tag list",
                    ));
                }
                Ok(())
            }
            Condition::Symbols { include, exclude } => {
                if include.is_empty() && exclude.is_empty() {
                    return Err(SigtraderError::validation(
                        "symbols condition requires include or exclude",
                    ));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// How an empty condition list evaluates.
///
/// Screening treats "no filter" as everything; strategies and alerts treat
/// "no rule" as never firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPolicy {
    MatchAll,
    MatchNone,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionSet {
    pub logic: Logic,
    pub conditions: Vec<Condition>,
}

impl ConditionSet {
    pub fn new(logic: Logic, conditions: Vec<Condition>) -> Self {
        Self { logic, conditions }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::new(Logic::And, conditions)
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::new(Logic::Or, conditions)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Numeric { field, cmp } => match cmp {
                Comparison::Between { min, max } => {
                    write!(f, "BETWEEN({}, {}, {})", field, min, max)
                }
                Comparison::Gt(v) | Comparison::Gte(v) | Comparison::Lt(v) | Comparison::Lte(v) => {
                    write!(f, "{}({}, {})", cmp.keyword(), field, v)
                }
            },
            Condition::Category { field, values } => {
                match field {
                    CategoryField::Market => write!(f, "MARKET(")?,
                    CategoryField::Industry => write!(f, "INDUSTRY(")?,
                    CategoryField::Other(name) => write!(f, "CATEGORY({}, ", name)?,
                }
                write_list(f, values)?;
                write!(f, ")")
            }
            Condition::Tags {
                include_any,
                include_all,
                exclude_any,
            } => {
                write!(f, "TAGS(")?;
                let mut first = true;
                for (keyword, tags) in [("ANY", include_any), ("ALL", include_all), ("NONE", exclude_any)]
                {
                    if tags.is_empty() {
                        continue;
                    }
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{}(", keyword)?;
                    write_list(f, tags)?;
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
            Condition::Symbols { include, exclude } => {
                write!(f, "SYMBOLS(")?;
                if !include.is_empty() {
                    write!(f, "INCLUDE(")?;
                    write_list(f, include)?;
                    write!(f, ")")?;
                }
                if !exclude.is_empty() {
                    if !include.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "EXCLUDE(")?;
                    write_list(f, exclude)?;
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self.logic {
            Logic::And => "ALL",
            Logic::Or => "ANY",
        };
        write!(f, "{}(", keyword)?;
        write_list(f, &self.conditions)?;
        write!(f, ")")
    }
}
