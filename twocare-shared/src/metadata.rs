//! Activity metadata validation
//!
//! Every activity type has a strict schema for its `metadata` object. All
//! fields are optional, unknown keys are rejected, and every violation is
//! collected before reporting so clients see the whole list at once.
//!
//! | Type            | Fields                                                         |
//! |-----------------|----------------------------------------------------------------|
//! | `FEEDING`       | `amount: number`, `unit: string`, `feedType: breast\|formula\|solid` |
//! | `DIAPER_CHANGE` | `hasUrine: bool`, `hasBowel: bool`, `condition: string`        |
//! | `SLEEP`         | `duration: number`, `quality: good\|fair\|poor`                |
//! | `GROWTH`        | `weight`, `height`, `headCircumference: number`                |
//! | `MEDICATION`    | `name: string`, `dose: number`, `unit: string`                 |
//! | `MILESTONE`     | `title: string`, `description: string`                        |
//! | `NOTE`          | any object                                                     |
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use twocare_shared::metadata::validate;
//! use twocare_shared::models::activity::ActivityType;
//!
//! assert!(validate(ActivityType::Feeding, &json!({"amount": 120, "unit": "ml"})).is_ok());
//!
//! let err = validate(ActivityType::Feeding, &json!({"amount": "lots", "foo": 1})).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "Invalid metadata for type FEEDING: metadata.amount: Expected number, received string; \
//!      metadata.foo: Unrecognized key"
//! );
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::activity::ActivityType;

/// Expected JSON shape of one metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Number,
    String,
    Bool,
    OneOf(&'static [&'static str]),
}

type Schema = &'static [(&'static str, FieldKind)];

const FEEDING: Schema = &[
    ("amount", FieldKind::Number),
    ("unit", FieldKind::String),
    ("feedType", FieldKind::OneOf(&["breast", "formula", "solid"])),
];

const DIAPER_CHANGE: Schema = &[
    ("hasUrine", FieldKind::Bool),
    ("hasBowel", FieldKind::Bool),
    ("condition", FieldKind::String),
];

const SLEEP: Schema = &[
    ("duration", FieldKind::Number),
    ("quality", FieldKind::OneOf(&["good", "fair", "poor"])),
];

const GROWTH: Schema = &[
    ("weight", FieldKind::Number),
    ("height", FieldKind::Number),
    ("headCircumference", FieldKind::Number),
];

const MEDICATION: Schema = &[
    ("name", FieldKind::String),
    ("dose", FieldKind::Number),
    ("unit", FieldKind::String),
];

const MILESTONE: Schema = &[
    ("title", FieldKind::String),
    ("description", FieldKind::String),
];

/// Schema for a type; `None` means any object is accepted
fn schema_for(activity_type: ActivityType) -> Option<Schema> {
    match activity_type {
        ActivityType::Feeding => Some(FEEDING),
        ActivityType::DiaperChange => Some(DIAPER_CHANGE),
        ActivityType::Sleep => Some(SLEEP),
        ActivityType::Growth => Some(GROWTH),
        ActivityType::Medication => Some(MEDICATION),
        ActivityType::Milestone => Some(MILESTONE),
        ActivityType::Note => None,
    }
}

/// One schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataIssue {
    /// Dotted path below `metadata`; empty for the root
    pub path: String,

    pub message: String,
}

impl fmt::Display for MetadataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "metadata: {}", self.message)
        } else {
            write!(f, "metadata.{}: {}", self.path, self.message)
        }
    }
}

/// Every violation found in one metadata object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataError {
    pub activity_type: ActivityType,
    pub issues: Vec<MetadataIssue>,
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "Invalid metadata for type {}: {}", self.activity_type, joined)
    }
}

impl std::error::Error for MetadataError {}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_field(kind: FieldKind, value: &Value) -> Option<String> {
    let expected = match kind {
        FieldKind::Number if value.is_number() => return None,
        FieldKind::String if value.is_string() => return None,
        FieldKind::Bool if value.is_boolean() => return None,
        FieldKind::Number => "number",
        FieldKind::String => "string",
        FieldKind::Bool => "boolean",
        FieldKind::OneOf(options) => {
            let listed = options
                .iter()
                .map(|o| format!("'{}'", o))
                .collect::<Vec<_>>()
                .join(" | ");
            return match value.as_str() {
                Some(s) if options.iter().any(|o| *o == s) => None,
                Some(s) => Some(format!("Invalid enum value. Expected {}, received '{}'", listed, s)),
                None => Some(format!(
                    "Expected {}, received {}",
                    listed,
                    json_type_name(value)
                )),
            };
        }
    };

    Some(format!("Expected {}, received {}", expected, json_type_name(value)))
}

fn check_object(schema: Schema, object: &Map<String, Value>) -> Vec<MetadataIssue> {
    let mut issues = Vec::new();

    // Declared fields first, in schema order
    for (name, kind) in schema {
        if let Some(value) = object.get(*name) {
            if let Some(message) = check_field(*kind, value) {
                issues.push(MetadataIssue {
                    path: name.to_string(),
                    message,
                });
            }
        }
    }

    let mut unknown: Vec<&String> = object
        .keys()
        .filter(|key| !schema.iter().any(|(name, _)| *name == key.as_str()))
        .collect();
    unknown.sort();
    issues.extend(unknown.into_iter().map(|key| MetadataIssue {
        path: key.clone(),
        message: "Unrecognized key".to_string(),
    }));

    issues
}

/// Validates `metadata` against the schema for `activity_type`
///
/// # Errors
///
/// Returns every violation: a non-object root, unknown keys, wrong types and
/// values outside an enumeration.
pub fn validate(activity_type: ActivityType, metadata: &Value) -> Result<(), MetadataError> {
    let issues = match metadata.as_object() {
        None => vec![MetadataIssue {
            path: String::new(),
            message: format!("Expected object, received {}", json_type_name(metadata)),
        }],
        Some(object) => match schema_for(activity_type) {
            Some(schema) => check_object(schema, object),
            None => Vec::new(),
        },
    };

    if issues.is_empty() {
        Ok(())
    } else {
        Err(MetadataError {
            activity_type,
            issues,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Breast,
    Formula,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedingMetadata {
    pub amount: Option<f64>,
    pub unit: Option<String>,
    pub feed_type: Option<FeedType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiaperChangeMetadata {
    pub has_urine: Option<bool>,
    pub has_bowel: Option<bool>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SleepMetadata {
    pub duration: Option<f64>,
    pub quality: Option<SleepQuality>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GrowthMetadata {
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub head_circumference: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MedicationMetadata {
    pub name: Option<String>,
    pub dose: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MilestoneMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Typed view of validated metadata
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityMetadata {
    Feeding(FeedingMetadata),
    DiaperChange(DiaperChangeMetadata),
    Sleep(SleepMetadata),
    Growth(GrowthMetadata),
    Medication(MedicationMetadata),
    Milestone(MilestoneMetadata),
    Note(Map<String, Value>),
}

impl ActivityMetadata {
    /// Validates and decodes metadata for `activity_type`
    pub fn parse(activity_type: ActivityType, metadata: &Value) -> Result<Self, MetadataError> {
        validate(activity_type, metadata)?;

        let decode_failure = |e: serde_json::Error| MetadataError {
            activity_type,
            issues: vec![MetadataIssue {
                path: String::new(),
                message: e.to_string(),
            }],
        };
        let value = metadata.clone();

        Ok(match activity_type {
            ActivityType::Feeding => Self::Feeding(serde_json::from_value(value).map_err(decode_failure)?),
            ActivityType::DiaperChange => {
                Self::DiaperChange(serde_json::from_value(value).map_err(decode_failure)?)
            }
            ActivityType::Sleep => Self::Sleep(serde_json::from_value(value).map_err(decode_failure)?),
            ActivityType::Growth => Self::Growth(serde_json::from_value(value).map_err(decode_failure)?),
            ActivityType::Medication => {
                Self::Medication(serde_json::from_value(value).map_err(decode_failure)?)
            }
            ActivityType::Milestone => {
                Self::Milestone(serde_json::from_value(value).map_err(decode_failure)?)
            }
            ActivityType::Note => Self::Note(serde_json::from_value(value).map_err(decode_failure)?),
        })
    }

    /// Activity type this metadata belongs to
    pub fn activity_type(&self) -> ActivityType {
        match self {
            Self::Feeding(_) => ActivityType::Feeding,
            Self::DiaperChange(_) => ActivityType::DiaperChange,
            Self::Sleep(_) => ActivityType::Sleep,
            Self::Growth(_) => ActivityType::Growth,
            Self::Medication(_) => ActivityType::Medication,
            Self::Milestone(_) => ActivityType::Milestone,
            Self::Note(_) => ActivityType::Note,
        }
    }
}
