use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Appended verbatim to every assembled prompt. Downstream consumers match on it.
pub const MANDATORY_SUFFIX: &str = "plain white studio background, shadowless, 4K quality, sharp focus, no text, no watermarks, no logos, high-end e-commerce photography.";

/// One layer of raw attribute values keyed by bare, `article_` or `ontology_<type>_` names.
pub type AttributeLayer = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductTypeConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDescriptor {
    pub product_type: String,
    pub product_type_confidence: ProductTypeConfidence,
    pub product_group: Option<String>,
    pub customer_segment: Option<String>,
    pub attributes: BTreeMap<String, String>,
    /// Diagnostics gathered while resolving (ambiguity, placeholders).
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotographyCategory {
    Wearable,
    Footwear,
    Accessories,
    NonWearable,
}

impl PhotographyCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            PhotographyCategory::Wearable => "wearable",
            PhotographyCategory::Footwear => "footwear",
            PhotographyCategory::Accessories => "accessories",
            PhotographyCategory::NonWearable => "non_wearable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelProfile {
    /// Phrase used in the model view, e.g. "female model".
    pub descriptor: String,
    pub gender: Gender,
}

impl ModelProfile {
    pub fn for_gender(gender: Gender) -> Self {
        let descriptor = match gender {
            Gender::Male => "male model",
            Gender::Female => "female model",
        };
        ModelProfile {
            descriptor: descriptor.to_string(),
            gender,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptComponents {
    pub product_description: String,
    pub front_prefix: String,
    pub back_prefix: String,
    pub model_prefix: String,
    pub front_details: String,
    pub back_details: String,
    pub model_details: String,
}

impl PromptComponents {
    /// Wire names of the seven required fields, in validation order.
    pub const FIELD_NAMES: [&'static str; 7] = [
        "productDescription",
        "frontPrefix",
        "backPrefix",
        "modelPrefix",
        "frontDetails",
        "backDetails",
        "modelDetails",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPrompts {
    pub front: String,
    pub back: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptGenerationResult {
    pub prompts: GeneratedPrompts,
    pub source: PromptSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed(PromptGenerationResult),
    Cancelled,
}

fn without_terminal_period(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed.strip_suffix('.').unwrap_or(trimmed)
}

fn assemble_view(prefix: &str, description: &str, details: &str) -> String {
    format!(
        "{} {}. {}. {}",
        prefix.trim(),
        description,
        without_terminal_period(details),
        MANDATORY_SUFFIX
    )
}

/// Builds the three view prompts around one shared product description.
pub fn assemble_prompts(components: &PromptComponents) -> GeneratedPrompts {
    let description = without_terminal_period(&components.product_description);
    GeneratedPrompts {
        front: assemble_view(
            &components.front_prefix,
            description,
            &components.front_details,
        ),
        back: assemble_view(
            &components.back_prefix,
            description,
            &components.back_details,
        ),
        model: assemble_view(
            &components.model_prefix,
            description,
            &components.model_details,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> PromptComponents {
        PromptComponents {
            product_description: "Navy Linen Relaxed Shirt".to_string(),
            front_prefix: "Ghost mannequin photo, front view of a".to_string(),
            back_prefix: "Ghost mannequin photo, back view of the same".to_string(),
            model_prefix: "Editorial photo of a male model wearing a".to_string(),
            front_details: "Camp collar and button placket visible.".to_string(),
            back_details: "Plain back yoke".to_string(),
            model_details: "Standing, relaxed pose".to_string(),
        }
    }

    #[test]
    fn description_is_shared_across_all_views() {
        let prompts = assemble_prompts(&components());
        for prompt in [&prompts.front, &prompts.back, &prompts.model] {
            assert!(prompt.contains("Navy Linen Relaxed Shirt"));
            assert!(prompt.ends_with(MANDATORY_SUFFIX));
        }
    }

    #[test]
    fn folds_trailing_periods_into_separators() {
        let prompts = assemble_prompts(&components());
        assert_eq!(
            prompts.front,
            format!(
                "Ghost mannequin photo, front view of a Navy Linen Relaxed Shirt. Camp collar and button placket visible. {}",
                MANDATORY_SUFFIX
            )
        );
        assert!(!prompts.front.contains(".."));
    }

    #[test]
    fn serializes_wire_field_names_in_camel_case() {
        let value = serde_json::to_value(components()).unwrap();
        let object = value.as_object().unwrap();
        for field in PromptComponents::FIELD_NAMES {
            assert!(object.contains_key(field), "missing {field}");
        }
        assert_eq!(object.len(), PromptComponents::FIELD_NAMES.len());
    }

    #[test]
    fn source_serializes_as_lowercase_tag() {
        assert_eq!(serde_json::to_value(PromptSource::Llm).unwrap(), "llm");
        assert_eq!(
            serde_json::to_value(PromptSource::Fallback).unwrap(),
            "fallback"
        );
    }
}
