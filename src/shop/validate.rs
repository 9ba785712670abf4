use std::fmt;

use serde::Serialize;

use super::{GenerationRequest, ItemDraft, ShopDraft, ShopType};
use crate::config::ValidationConfig;

/// One domain rule a generated shop broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    MissingField {
        field: String,
    },
    ItemCountMismatch {
        expected: u32,
        actual: usize,
    },
    MissingItemField {
        index: usize,
        field: String,
    },
    LevelOutOfRange {
        index: usize,
        expected: u32,
        actual: i64,
        tolerance: u32,
    },
    AttributeOutOfRange {
        index: usize,
        attribute: String,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "missing field `{field}`"),
            Self::ItemCountMismatch { expected, actual } => {
                write!(f, "expected {expected} items, got {actual}")
            }
            Self::MissingItemField { index, field } => {
                write!(f, "item {index}: missing field `{field}`")
            }
            Self::LevelOutOfRange {
                index,
                expected,
                actual,
                tolerance,
            } => write!(
                f,
                "item {index}: level {actual} is not within {tolerance} of requested level {expected}"
            ),
            Self::AttributeOutOfRange {
                index,
                attribute,
                value,
                min,
                max,
            } => write!(f, "item {index}: {attribute} {value} outside {min}..={max}"),
        }
    }
}

/// Check a draft against the request it answers.
///
/// Every violation is collected; an empty list means the draft may be
/// accepted.
pub fn validate(
    draft: &ShopDraft,
    request: &GenerationRequest,
    limits: &ValidationConfig,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if draft.id.is_none() {
        issues.push(missing("id"));
    }
    if is_blank(&draft.name) {
        issues.push(missing("name"));
    }
    if is_blank(&draft.shopkeeper_description) {
        issues.push(missing("shopkeeper_description"));
    }

    let Some(goods) = &draft.goods else {
        issues.push(missing("goods"));
        return issues;
    };

    if goods.len() != request.number_of_items as usize {
        issues.push(ValidationIssue::ItemCountMismatch {
            expected: request.number_of_items,
            actual: goods.len(),
        });
    }

    for (index, item) in goods.iter().enumerate() {
        check_item(index, item, request, limits, &mut issues);
    }

    issues
}

fn check_item(
    index: usize,
    item: &ItemDraft,
    request: &GenerationRequest,
    limits: &ValidationConfig,
    issues: &mut Vec<ValidationIssue>,
) {
    if is_blank(&item.name) {
        issues.push(missing_item(index, "name"));
    }

    match item.level {
        None => issues.push(missing_item(index, "level")),
        Some(level) => {
            let drift = level.abs_diff(i64::from(request.level));
            if level < 1
                || level > i64::from(u32::MAX)
                || drift > u64::from(limits.level_tolerance)
            {
                issues.push(ValidationIssue::LevelOutOfRange {
                    index,
                    expected: request.level,
                    actual: level,
                    tolerance: limits.level_tolerance,
                });
            }
        }
    }

    let level = i64::from(request.level);
    check_attribute(
        index,
        "damage",
        item.damage,
        request.shop_type == ShopType::Weapons,
        attribute_ceiling(limits.max_damage_per_level, level),
        issues,
    );
    check_attribute(
        index,
        "armor",
        item.armor,
        request.shop_type == ShopType::Armor,
        attribute_ceiling(limits.max_armor_per_level, level),
        issues,
    );
}

/// Highest value an attribute may take; a shop item stores it as `u32`.
fn attribute_ceiling(per_level: u32, level: i64) -> i64 {
    (i64::from(per_level) * level).min(i64::from(u32::MAX))
}

fn check_attribute(
    index: usize,
    attribute: &str,
    value: Option<i64>,
    required: bool,
    max: i64,
    issues: &mut Vec<ValidationIssue>,
) {
    match value {
        None if required => issues.push(missing_item(index, attribute)),
        None => {}
        Some(value) if value < 1 || value > max => {
            issues.push(ValidationIssue::AttributeOutOfRange {
                index,
                attribute: attribute.to_string(),
                value,
                min: 1,
                max,
            });
        }
        Some(_) => {}
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

fn missing(field: &str) -> ValidationIssue {
    ValidationIssue::MissingField {
        field: field.to_string(),
    }
}

fn missing_item(index: usize, field: &str) -> ValidationIssue {
    ValidationIssue::MissingItemField {
        index,
        field: field.to_string(),
    }
}
