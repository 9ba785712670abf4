use serde_json::{json, Value};

use super::ShopType;

/// JSON schema describing the shop document the model must return.
///
/// Written in plain JSON Schema; backends that speak a different dialect
/// convert it themselves.  Weapons and armor shops additionally require
/// their attribute on every item.
pub fn shop_schema(shop_type: ShopType) -> Value {
    let mut item_required = vec!["name", "level"];
    match shop_type {
        ShopType::Weapons => item_required.push("damage"),
        ShopType::Armor => item_required.push("armor"),
        ShopType::Potions | ShopType::Magic | ShopType::General => {}
    }

    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "name": { "type": "string" },
            "shopkeeper_description": { "type": "string" },
            "goods": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "level": { "type": "integer" },
                        "damage": { "type": "integer" },
                        "armor": { "type": "integer" }
                    },
                    "required": item_required
                }
            }
        },
        "required": ["id", "name", "shopkeeper_description", "goods"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_required(schema: &Value) -> Vec<&str> {
        schema["properties"]["goods"]["items"]["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect()
    }

    #[test]
    fn top_level_fields_required() {
        let schema = shop_schema(ShopType::General);
        assert_eq!(schema["type"], "object");
        assert_eq!(
            schema["required"],
            json!(["id", "name", "shopkeeper_description", "goods"])
        );
    }

    #[test]
    fn weapons_require_damage() {
        assert_eq!(item_required(&shop_schema(ShopType::Weapons)), ["name", "level", "damage"]);
    }

    #[test]
    fn armor_requires_armor() {
        assert_eq!(item_required(&shop_schema(ShopType::Armor)), ["name", "level", "armor"]);
    }

    #[test]
    fn other_types_require_name_and_level() {
        for shop_type in [ShopType::Potions, ShopType::Magic, ShopType::General] {
            assert_eq!(item_required(&shop_schema(shop_type)), ["name", "level"]);
        }
    }
}
