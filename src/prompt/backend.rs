use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::prompt::fallback::is_lower_body;
use crate::prompt::types::{
    ModelProfile, PhotographyCategory, PromptComponents, ResolvedDescriptor,
};

/// A hosted chat-style model that answers one system + user exchange with text.
#[async_trait]
pub trait PromptBackend: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    async fn complete(&self, system_prompt: &str, user_content: &str) -> anyhow::Result<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("backend transport error: {0:#}")]
    Transport(#[source] anyhow::Error),
    #[error("response is not a valid JSON object: {0}")]
    Parse(String),
    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),
}

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("valid code fence regex")
});

const BASE_INSTRUCTIONS: &str = r#"You are a senior e-commerce fashion photographer and prompt engineer. You write image-generation prompts for three views of ONE product: a front view, a back view and a model view.

The three prompts are assembled as "<prefix> <productDescription>. <details>." so:
- productDescription is a single noun phrase (color, material, fit, style, product type and key design features) reused verbatim in all three views. It must be specific enough that all three images show the identical product.
- Prefixes end right before the product noun phrase (e.g. "Ghost mannequin fashion photography, front view of a").
- Details describe only what is visible in that view. Do not repeat the background, lighting or quality terms; they are appended automatically.

Respond with ONLY a JSON object with exactly these string fields:
{"productDescription": "...", "frontPrefix": "...", "backPrefix": "...", "modelPrefix": "...", "frontDetails": "...", "backDetails": "...", "modelDetails": "..."}"#;

const GHOST_MANNEQUIN_RULES: &str = "PHOTOGRAPHY STYLE: ghost mannequin (invisible mannequin) for the front and back views.\n- Front view: garment shown with natural 3D volume, neckline to hem, all front closures, pockets and trims visible.\n- Back view: only the rear of the garment (back panel, back yoke, back seams, hood from behind if any). Never mention buttons, zippers, plackets, front pockets, collar points, chest prints or any other front-only feature.\n- Model view: full-body shot of the model wearing the garment, styled simply so the garment stays the focus.";

const FLAT_LAY_RULES: &str = "PHOTOGRAPHY STYLE: overhead flat lay for the front and back views (lower-body garment).\n- Front view: laid flat and symmetrical, shot from directly above, waistband to hem visible, front rise, fly and front pockets visible where present.\n- Back view: laid face down from directly above, showing back pockets, yoke and seat seams only. Never mention the fly, front pockets, front pleats or any other front-only feature.\n- Model view: full-body shot, paired with a plain neutral top.";

const FOOTWEAR_RULES: &str = "PHOTOGRAPHY STYLE: three-quarter product shot of a pair of shoes.\n- Front view: three-quarter angle showing toe shape, upper, lacing or closure and outer side profile.\n- Back view: shot from behind at shoe level showing heel counter, heel tab and back of the sole only. Never mention laces, toe cap or vamp details.\n- Model view: cropped from the knee down, natural walking stance, footwear in sharp focus.";

const ACCESSORIES_RULES: &str = "PHOTOGRAPHY STYLE: three-quarter product shot of an accessory.\n- Front view: centered with a subtle three-quarter angle, hardware, closures and texture visible.\n- Back view: reverse side only, back construction and finishing. Never mention front logos, front hardware or front closures.\n- Model view: close framing on the model with the accessory as the clear focus.";

const NON_WEARABLE_RULES: &str = "PHOTOGRAPHY STYLE: straight product shot of a non-wearable item.\n- Front view: centered, full object visible with true proportions.\n- Back view: rear side only, back construction and finish. Never mention front-facing decoration or labels.\n- Model view: lifestyle shot of the model holding or using the product naturally.";

fn category_rules(category: PhotographyCategory, product_type: &str) -> &'static str {
    match category {
        PhotographyCategory::Wearable if is_lower_body(product_type) => FLAT_LAY_RULES,
        PhotographyCategory::Wearable => GHOST_MANNEQUIN_RULES,
        PhotographyCategory::Footwear => FOOTWEAR_RULES,
        PhotographyCategory::Accessories => ACCESSORIES_RULES,
        PhotographyCategory::NonWearable => NON_WEARABLE_RULES,
    }
}

pub fn build_system_prompt(
    descriptor: &ResolvedDescriptor,
    category: PhotographyCategory,
    model_profile: &ModelProfile,
) -> String {
    format!(
        "{}\n\n{}\n\nThe model view must show a {}. modelPrefix must name the model that way.",
        BASE_INSTRUCTIONS,
        category_rules(category, &descriptor.product_type),
        model_profile.descriptor
    )
}

pub fn build_user_message(
    descriptor: &ResolvedDescriptor,
    category: PhotographyCategory,
    model_profile: &ModelProfile,
) -> String {
    let mut lines = vec![
        format!("Product type: {}", descriptor.product_type),
        format!(
            "Product group: {}",
            descriptor.product_group.as_deref().unwrap_or("unknown")
        ),
        format!(
            "Customer segment: {}",
            descriptor.customer_segment.as_deref().unwrap_or("unknown")
        ),
        format!("Photography category: {}", category.as_str()),
        format!("Model: {}", model_profile.descriptor),
    ];

    if descriptor.attributes.is_empty() {
        lines.push("Attributes: none provided".to_string());
    } else {
        lines.push("Attributes:".to_string());
        for (key, value) in &descriptor.attributes {
            lines.push(format!("- {}: {}", key.replace('_', " "), value));
        }
    }

    lines.push(String::new());
    lines.push("Write the seven JSON fields for this product.".to_string());
    lines.join("\n")
}

/// Removes one surrounding ``` fence (with optional language tag) if present.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    match CODE_FENCE_RE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str().trim()),
        None => trimmed,
    }
}

fn required_field(object: &Map<String, Value>, field: &'static str) -> Result<String, SynthesisError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(SynthesisError::MissingField(field))
}

/// Parses a backend reply into validated components.
pub fn parse_components(reply: &str) -> Result<PromptComponents, SynthesisError> {
    let body = strip_code_fence(reply);
    let value: Value =
        serde_json::from_str(body).map_err(|err| SynthesisError::Parse(err.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| SynthesisError::Parse("top-level value is not an object".to_string()))?;

    let [description, front_prefix, back_prefix, model_prefix, front_details, back_details, model_details] =
        PromptComponents::FIELD_NAMES;

    Ok(PromptComponents {
        product_description: required_field(object, description)?,
        front_prefix: required_field(object, front_prefix)?,
        back_prefix: required_field(object, back_prefix)?,
        model_prefix: required_field(object, model_prefix)?,
        front_details: required_field(object, front_details)?,
        back_details: required_field(object, back_details)?,
        model_details: required_field(object, model_details)?,
    })
}

pub async fn synthesize_via_backend(
    backend: &dyn PromptBackend,
    descriptor: &ResolvedDescriptor,
    category: PhotographyCategory,
    model_profile: &ModelProfile,
) -> Result<PromptComponents, SynthesisError> {
    let system_prompt = build_system_prompt(descriptor, category, model_profile);
    let user_message = build_user_message(descriptor, category, model_profile);

    let reply = backend
        .complete(&system_prompt, &user_message)
        .await
        .map_err(SynthesisError::Transport)?;
    debug!(
        "{} replied with {} chars for product_type={}",
        backend.name(),
        reply.chars().count(),
        descriptor.product_type
    );

    parse_components(&reply)
}
