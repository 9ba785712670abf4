use super::{GenerationRequest, ShopType};

/// Build the instruction sent to the model for a shop request.
pub fn build(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "generate a {} shop of {} level {} items, add a short description for the shop keeper",
        request.shop_type, request.number_of_items, request.level
    );

    if let Some(suffix) = category_suffix(request.shop_type) {
        prompt.push_str(", ");
        prompt.push_str(suffix);
    }

    prompt
}

/// Extra instruction for categories whose items carry a numeric attribute.
pub fn category_suffix(shop_type: ShopType) -> Option<&'static str> {
    match shop_type {
        ShopType::Weapons => Some("add damage values for the items"),
        ShopType::Armor => Some("add armor values for the items"),
        ShopType::Potions | ShopType::Magic | ShopType::General => None,
    }
}
