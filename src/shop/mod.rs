pub mod prompt;
pub mod schema;
pub mod service;
pub mod store;
pub mod validate;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::error::{Result, ShopsmithError};

pub use service::ShopService;
pub use store::ShopStore;
pub use validate::ValidationIssue;

/// Kind of goods a shop sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopType {
    Weapons,
    Armor,
    Potions,
    Magic,
    General,
}

impl ShopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weapons => "weapons",
            Self::Armor => "armor",
            Self::Potions => "potions",
            Self::Magic => "magic",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ShopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound request for a new shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(rename = "type")]
    pub shop_type: ShopType,
    pub number_of_items: u32,
    pub level: u32,
}

impl GenerationRequest {
    pub fn new(shop_type: ShopType, number_of_items: u32, level: u32) -> Self {
        Self {
            shop_type,
            number_of_items,
            level,
        }
    }

    /// Reject requests that can never produce a valid shop.
    pub fn check(&self, limits: &ValidationConfig) -> Result<()> {
        if self.number_of_items == 0 {
            return Err(ShopsmithError::InvalidRequest(
                "numberOfItems must be at least 1".into(),
            ));
        }
        if self.number_of_items > limits.max_items {
            return Err(ShopsmithError::InvalidRequest(format!(
                "numberOfItems must be at most {}",
                limits.max_items
            )));
        }
        if self.level == 0 {
            return Err(ShopsmithError::InvalidRequest(
                "level must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A single good for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armor: Option<u32>,
}

/// A validated, accepted shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    pub shopkeeper_description: String,
    pub goods: Vec<Item>,
}

/// Item as the model produced it.  Numbers are signed so out-of-range
/// values surface as validation issues instead of parse failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub damage: Option<i64>,
    #[serde(default)]
    pub armor: Option<i64>,
}

/// Shop as the model produced it, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShopDraft {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub shopkeeper_description: Option<String>,
    #[serde(default)]
    pub goods: Option<Vec<ItemDraft>>,
}

impl ShopDraft {
    /// Parse raw model text into a draft.
    ///
    /// Tolerates a surrounding markdown code fence, which some chat
    /// backends add even when asked for bare JSON.
    pub fn parse(text: &str) -> Result<Self> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err(ShopsmithError::MalformedResponse(
                "model returned no JSON body".into(),
            ));
        }
        serde_json::from_str(body).map_err(|e| ShopsmithError::MalformedResponse(e.to_string()))
    }

    /// Convert a draft that passed validation into a [`Shop`].
    pub(crate) fn into_shop(self) -> Result<Shop> {
        let incomplete = || ShopsmithError::MalformedResponse("incomplete shop record".into());

        let goods = self
            .goods
            .ok_or_else(incomplete)?
            .into_iter()
            .map(|item| -> Result<Item> {
                Ok(Item {
                    name: item.name.ok_or_else(incomplete)?,
                    level: to_u32(item.level.ok_or_else(incomplete)?)?,
                    damage: item.damage.map(to_u32).transpose()?,
                    armor: item.armor.map(to_u32).transpose()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Shop {
            id: self.id.ok_or_else(incomplete)?,
            name: self.name.ok_or_else(incomplete)?,
            shopkeeper_description: self.shopkeeper_description.ok_or_else(incomplete)?,
            goods,
        })
    }
}

fn to_u32(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ShopsmithError::MalformedResponse(format!("value {value} out of range")))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => return "",
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_original_field_names() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"type":"weapons","numberOfItems":3,"level":5}"#).unwrap();
        assert_eq!(req, GenerationRequest::new(ShopType::Weapons, 3, 5));
    }

    #[test]
    fn unknown_shop_type_is_rejected() {
        let res: std::result::Result<GenerationRequest, _> =
            serde_json::from_str(r#"{"type":"bakery","numberOfItems":3,"level":5}"#);
        assert!(res.is_err());
    }

    #[test]
    fn check_rejects_zero_items_and_level() {
        let limits = ValidationConfig::default();
        assert!(GenerationRequest::new(ShopType::Armor, 0, 1).check(&limits).is_err());
        assert!(GenerationRequest::new(ShopType::Armor, 1, 0).check(&limits).is_err());
        assert!(GenerationRequest::new(ShopType::Armor, 1, 1).check(&limits).is_ok());
    }

    #[test]
    fn check_rejects_too_many_items() {
        let limits = ValidationConfig {
            max_items: 4,
            ..Default::default()
        };
        let err = GenerationRequest::new(ShopType::General, 5, 1)
            .check(&limits)
            .unwrap_err();
        assert!(matches!(err, ShopsmithError::InvalidRequest(_)));
        assert!(err.to_string().contains("at most 4"));
    }

    #[test]
    fn parse_plain_json() {
        let draft = ShopDraft::parse(
            r#"{"id":1,"name":"Forge","shopkeeper_description":"Burly","goods":[{"name":"Axe","level":2,"damage":9}]}"#,
        )
        .unwrap();
        assert_eq!(draft.id, Some(1));
        let goods = draft.goods.unwrap();
        assert_eq!(goods.len(), 1);
        assert_eq!(goods[0].damage, Some(9));
        assert_eq!(goods[0].armor, None);
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"name\":\"Forge\"}\n```";
        let draft = ShopDraft::parse(text).unwrap();
        assert_eq!(draft.name.as_deref(), Some("Forge"));
        assert!(draft.goods.is_none());
    }

    #[test]
    fn parse_non_json_is_malformed() {
        let err = ShopDraft::parse("Sure! Here is your shop.").unwrap_err();
        assert!(matches!(err, ShopsmithError::MalformedResponse(_)));
    }

    #[test]
    fn parse_empty_is_malformed() {
        assert!(matches!(
            ShopDraft::parse("  ").unwrap_err(),
            ShopsmithError::MalformedResponse(_)
        ));
        assert!(matches!(
            ShopDraft::parse("```").unwrap_err(),
            ShopsmithError::MalformedResponse(_)
        ));
    }

    #[test]
    fn parse_wrong_types_is_malformed() {
        let err = ShopDraft::parse(r#"{"goods":[{"name":"Axe","level":"five"}]}"#).unwrap_err();
        assert!(matches!(err, ShopsmithError::MalformedResponse(_)));
    }

    #[test]
    fn negative_values_parse_for_validation() {
        let draft = ShopDraft::parse(r#"{"goods":[{"name":"Axe","level":-1}]}"#).unwrap();
        assert_eq!(draft.goods.unwrap()[0].level, Some(-1));
    }

    #[test]
    fn into_shop_requires_all_fields() {
        let draft = ShopDraft {
            id: Some(1),
            name: Some("Forge".into()),
            shopkeeper_description: None,
            goods: Some(vec![]),
        };
        assert!(draft.into_shop().is_err());
    }

    #[test]
    fn shop_serializes_without_absent_attributes() {
        let shop = Shop {
            id: 7,
            name: "Tailor".into(),
            shopkeeper_description: "Quiet".into(),
            goods: vec![Item {
                name: "Cloak".into(),
                level: 1,
                damage: None,
                armor: Some(2),
            }],
        };
        let json = serde_json::to_value(&shop).unwrap();
        assert!(json["goods"][0].get("damage").is_none());
        assert_eq!(json["goods"][0]["armor"], 2);
    }
}
