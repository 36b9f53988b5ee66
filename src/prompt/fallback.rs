//! Deterministic prompt components used when the backend path is exhausted.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::prompt::types::{ModelProfile, PhotographyCategory, PromptComponents, ResolvedDescriptor};

static LOWER_BODY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\w*(?:trousers?|pants?|jeans|shorts|skirts?|leggings?|joggers?|chinos?|culottes?)\b",
    )
    .expect("valid lower body regex")
});

/// Attribute keys folded into the leading description, in output order.
const DESCRIPTION_KEY_GROUPS: &[&[&str]] = &[
    &["specific_color", "color", "colour", "color_name", "main_color"],
    &["material", "fabric", "main_material", "composition"],
    &["fit"],
    &["style"],
];

const GENERIC_MODEL: &str = "model";

struct ViewTemplates {
    front_prefix: &'static str,
    back_prefix: &'static str,
    /// `{model}` is replaced by the model descriptor.
    model_prefix: &'static str,
    front_details: &'static str,
    back_details: &'static str,
    model_details: &'static str,
}

const GHOST_MANNEQUIN: ViewTemplates = ViewTemplates {
    front_prefix: "Ghost mannequin fashion photography, front view of a",
    back_prefix: "Ghost mannequin fashion photography, back view of the same",
    model_prefix: "Professional e-commerce fashion photography of a {model} wearing a",
    front_details: "Invisible mannequin with natural drape and realistic three-dimensional shape, full garment centered from neckline to hem, true-to-life color and fabric texture",
    back_details: "Invisible mannequin showing only the rear of the garment, back panel, back seams and hem clearly visible, same color and fabric texture",
    model_details: "Full-body shot, natural standing pose facing the camera, garment fitted true to size and styled simply so it stays the focus",
};

const FLAT_LAY: ViewTemplates = ViewTemplates {
    front_prefix: "Flat lay fashion photography, overhead front view of a",
    back_prefix: "Flat lay fashion photography, overhead back view of the same",
    model_prefix: "Professional e-commerce fashion photography of a {model} wearing a",
    front_details: "Laid perfectly flat and symmetrical, shot from directly above, waistband to hem fully visible, crisp edges and true-to-life fabric texture",
    back_details: "Laid flat face down, shot from directly above, showing only the rear panel, back seams and back pockets, same color and fabric texture",
    model_details: "Full-body shot, natural standing pose, paired with a plain neutral top so the garment stays the focus",
};

const FOOTWEAR: ViewTemplates = ViewTemplates {
    front_prefix: "Professional product photography, three-quarter front view of a pair of",
    back_prefix: "Professional product photography, rear view of the same pair of",
    model_prefix: "Professional e-commerce photography of a {model} wearing a pair of",
    front_details: "Three-quarter angle showing toe shape, upper and outer side profile with the sole edge visible, true-to-life material texture",
    back_details: "Shot from behind at shoe level, showing only the heel counter, heel tab and back of the sole",
    model_details: "Cropped from the knee down, natural walking stance, footwear in sharp focus",
};

const ACCESSORIES: ViewTemplates = ViewTemplates {
    front_prefix: "Professional product photography, three-quarter front view of a",
    back_prefix: "Professional product photography, back view of the same",
    model_prefix: "Professional e-commerce photography of a {model} styled with a",
    front_details: "Centered with a subtle three-quarter angle, hardware, texture and shape clearly visible",
    back_details: "Reverse side only, showing back construction, finishing and material texture",
    model_details: "Close framing that keeps the accessory as the clear focus, simple neutral outfit",
};

const NON_WEARABLE: ViewTemplates = ViewTemplates {
    front_prefix: "Professional product photography, front view of a",
    back_prefix: "Professional product photography, back view of the same",
    model_prefix: "Lifestyle product photography of a {model} holding a",
    front_details: "Centered product shot, full object visible with true-to-life color, material and proportions",
    back_details: "Rear side only, showing back construction and finish",
    model_details: "Product held naturally at chest height, hands and product in sharp focus",
};

/// Lower-body garments are shot flat rather than on a mannequin.
pub fn is_lower_body(product_type: &str) -> bool {
    LOWER_BODY_RE.is_match(product_type)
}

fn templates_for(category: PhotographyCategory, product_type: &str) -> &'static ViewTemplates {
    match category {
        PhotographyCategory::Wearable if is_lower_body(product_type) => &FLAT_LAY,
        PhotographyCategory::Wearable => &GHOST_MANNEQUIN,
        PhotographyCategory::Footwear => &FOOTWEAR,
        PhotographyCategory::Accessories => &ACCESSORIES,
        PhotographyCategory::NonWearable => &NON_WEARABLE,
    }
}

fn humanize_key(key: &str) -> String {
    key.replace('_', " ")
}

/// `<color> <material> <fit> <style> <type>` followed by any remaining attributes.
pub fn build_product_description(descriptor: &ResolvedDescriptor) -> String {
    let mut consumed = BTreeSet::new();
    let mut words = Vec::new();

    for group in DESCRIPTION_KEY_GROUPS {
        let hit = group
            .iter()
            .find_map(|key| descriptor.attributes.get(*key).map(|value| (*key, value)));
        if let Some((key, value)) = hit {
            consumed.insert(key);
            words.push(value.as_str());
        }
    }
    words.push(descriptor.product_type.as_str());

    let mut description = words.join(" ");

    let extras = descriptor
        .attributes
        .iter()
        .filter(|(key, _)| !consumed.contains(key.as_str()))
        .map(|(key, value)| format!("{}: {}", humanize_key(key), value))
        .collect::<Vec<_>>();
    if !extras.is_empty() {
        description.push_str(" with ");
        description.push_str(&extras.join(", "));
    }
    description
}

pub fn synthesize_fallback(
    descriptor: &ResolvedDescriptor,
    category: PhotographyCategory,
    model_profile: Option<&ModelProfile>,
) -> PromptComponents {
    let templates = templates_for(category, &descriptor.product_type);
    let model = model_profile
        .map(|profile| profile.descriptor.trim())
        .filter(|descriptor| !descriptor.is_empty())
        .unwrap_or(GENERIC_MODEL);

    PromptComponents {
        product_description: build_product_description(descriptor),
        front_prefix: templates.front_prefix.to_string(),
        back_prefix: templates.back_prefix.to_string(),
        model_prefix: templates.model_prefix.replace("{model}", model),
        front_details: templates.front_details.to_string(),
        back_details: templates.back_details.to_string(),
        model_details: templates.model_details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::attributes::resolve;
    use crate::prompt::types::{assemble_prompts, AttributeLayer, Gender, MANDATORY_SUFFIX};

    fn layer(pairs: &[(&str, &str)]) -> AttributeLayer {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn hoodie_front_prompt_uses_ghost_mannequin_family() {
        let descriptor = resolve(
            None,
            None,
            Some(&layer(&[
                ("specific_color", "Black"),
                ("material", "Cotton"),
                ("article_product_type", "Hoodie"),
            ])),
        );
        let components = synthesize_fallback(&descriptor, PhotographyCategory::Wearable, None);
        let prompts = assemble_prompts(&components);
        assert!(prompts
            .front
            .starts_with("Ghost mannequin fashion photography, front view of a Black Cotton Hoodie."));
        assert!(prompts.back.ends_with(MANDATORY_SUFFIX));
    }

    #[test]
    fn trousers_route_to_flat_lay_templates() {
        let descriptor = resolve(
            None,
            None,
            Some(&layer(&[("ontology_trousers_fit", "Wide"), ("color", "Beige")])),
        );
        assert_eq!(descriptor.product_type, "Trousers");
        let components = synthesize_fallback(&descriptor, PhotographyCategory::Wearable, None);
        assert!(components.front_prefix.starts_with("Flat lay"));
        assert!(components.back_prefix.starts_with("Flat lay"));
        assert!(!components.front_prefix.contains("Ghost mannequin"));
        assert_eq!(components.product_description, "Beige Wide Trousers");
    }

    #[test]
    fn remaining_attributes_form_a_trailing_clause() {
        let descriptor = resolve(
            None,
            None,
            Some(&layer(&[
                ("article_product_type", "Shirt"),
                ("colour", "White"),
                ("sleeve_length", "Long"),
                ("collar", "Button-down"),
            ])),
        );
        assert_eq!(
            build_product_description(&descriptor),
            "White Shirt with collar: Button-down, sleeve length: Long"
        );
    }

    #[test]
    fn model_prefix_uses_profile_or_generic_phrasing() {
        let descriptor = resolve(None, None, Some(&layer(&[("product_type", "Sneakers")])));
        let profile = ModelProfile::for_gender(Gender::Male);
        let with_profile =
            synthesize_fallback(&descriptor, PhotographyCategory::Footwear, Some(&profile));
        assert_eq!(
            with_profile.model_prefix,
            "Professional e-commerce photography of a male model wearing a pair of"
        );

        let without = synthesize_fallback(&descriptor, PhotographyCategory::Footwear, None);
        assert_eq!(
            without.model_prefix,
            "Professional e-commerce photography of a model wearing a pair of"
        );
    }

    #[test]
    fn every_category_populates_all_fields() {
        let descriptor = resolve(None, None, None);
        for category in [
            PhotographyCategory::Wearable,
            PhotographyCategory::Footwear,
            PhotographyCategory::Accessories,
            PhotographyCategory::NonWearable,
        ] {
            let components = synthesize_fallback(&descriptor, category, None);
            let value = serde_json::to_value(&components).unwrap();
            for field in PromptComponents::FIELD_NAMES {
                let text = value[field].as_str().unwrap();
                assert!(!text.trim().is_empty(), "{field} empty for {category:?}");
            }
        }
    }

    #[test]
    fn lower_body_detection_covers_common_terms() {
        for product_type in ["Jeans", "Sweatpants", "Mini Skirt", "Leggings", "Shorts"] {
            assert!(is_lower_body(product_type), "{product_type}");
        }
        for product_type in [
            "Hoodie",
            "Blazer",
            "Dress",
            "Short Sleeve Top",
            "Jean Jacket",
            "Pantyhose",
        ] {
            assert!(!is_lower_body(product_type), "{product_type}");
        }
    }
}
