//! Merges the context, locked and predicted attribute layers into one descriptor.
//!
//! Keys arrive in three conventions: bare (`color`), article-scoped
//! (`article_color`) and ontology-scoped (`ontology_<type>_color`, where the type
//! segment may contain hyphens but never underscores). Keys starting with `_`
//! are internal and are dropped.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::prompt::types::{AttributeLayer, ProductTypeConfidence, ResolvedDescriptor};

pub const PLACEHOLDER_PRODUCT_TYPE: &str = "Product";

const PRODUCT_TYPE_KEYS: &[&str] = &[
    "article_product_type",
    "article_product_type_name",
    "product_type",
    "product_type_name",
];

const PRODUCT_GROUP_KEYS: &[&str] = &[
    "article_product_group_name",
    "article_product_group",
    "product_group_name",
    "product_group",
];

const CUSTOMER_SEGMENT_KEYS: &[&str] = &[
    "article_customer_segment",
    "article_index_group_name",
    "article_index_name",
    "customer_segment",
    "index_group_name",
    "target_audience",
];

const ARTICLE_PREFIX: &str = "article_";

static ONTOLOGY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ontology_([^_]+)_(.+)$").expect("valid ontology key regex"));

/// Cleaned names of every key consumed as type, group or segment.
static CONSUMED_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    PRODUCT_TYPE_KEYS
        .iter()
        .chain(PRODUCT_GROUP_KEYS)
        .chain(CUSTOMER_SEGMENT_KEYS)
        .map(|key| key.strip_prefix(ARTICLE_PREFIX).unwrap_or(key))
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum KeyScope {
    Bare,
    Article,
    Ontology,
}

/// Merged values plus the rank (0 = context, 2 = predicted) of the layer each
/// surviving value came from.
fn merge_layers(
    layers: [Option<&AttributeLayer>; 3],
) -> (BTreeMap<String, String>, BTreeMap<String, usize>) {
    let mut merged = BTreeMap::new();
    let mut ranks = BTreeMap::new();
    for (rank, layer) in layers.into_iter().enumerate() {
        let Some(layer) = layer else {
            continue;
        };
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
            ranks.insert(key.clone(), rank);
        }
    }
    (merged, ranks)
}

fn first_present(merged: &BTreeMap<String, String>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|key| {
        merged
            .get(*key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Title-cases each hyphen-separated segment: `t-shirt` becomes `T-Shirt`.
pub fn display_product_type(raw: &str) -> String {
    raw.trim()
        .split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn tally_ontology_types(merged: &BTreeMap<String, String>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for key in merged.keys() {
        if let Some(caps) = ONTOLOGY_KEY_RE.captures(key) {
            *counts.entry(caps[1].to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn extract_product_type(
    merged: &BTreeMap<String, String>,
    notes: &mut Vec<String>,
) -> (String, ProductTypeConfidence) {
    if let Some(explicit) = first_present(merged, PRODUCT_TYPE_KEYS) {
        return (explicit, ProductTypeConfidence::High);
    }

    let counts = tally_ontology_types(merged);
    // BTreeMap iterates in ascending name order, so keeping the first maximum
    // resolves ties lexicographically.
    let mut best: Option<(&String, usize)> = None;
    for (name, count) in &counts {
        if best.map_or(true, |(_, best_count)| *count > best_count) {
            best = Some((name, *count));
        }
    }

    match (best, counts.len()) {
        (None, _) => {
            let note = "no product type found in attributes; using placeholder".to_string();
            debug!("{}", note);
            notes.push(note);
            (
                PLACEHOLDER_PRODUCT_TYPE.to_string(),
                ProductTypeConfidence::Low,
            )
        }
        (Some((name, _)), 1) => (display_product_type(name), ProductTypeConfidence::High),
        (Some((name, count)), distinct) => {
            let summary = counts
                .iter()
                .map(|(name, count)| format!("{name}={count}"))
                .collect::<Vec<_>>()
                .join(", ");
            let note = format!(
                "ambiguous product type across {distinct} ontology types [{summary}]; chose '{name}' with {count} key(s)"
            );
            warn!("{}", note);
            notes.push(note);
            (display_product_type(name), ProductTypeConfidence::Medium)
        }
    }
}

fn clean_key(key: &str) -> (String, KeyScope) {
    if let Some(caps) = ONTOLOGY_KEY_RE.captures(key) {
        return (caps[2].to_string(), KeyScope::Ontology);
    }
    if let Some(stripped) = key.strip_prefix(ARTICLE_PREFIX) {
        if !stripped.is_empty() {
            return (stripped.to_string(), KeyScope::Article);
        }
    }
    (key.to_string(), KeyScope::Bare)
}

/// Collisions on a cleaned name go to the higher layer; scope only breaks ties
/// within one layer.
fn clean_attributes(
    merged: &BTreeMap<String, String>,
    ranks: &BTreeMap<String, usize>,
) -> BTreeMap<String, String> {
    let mut cleaned: BTreeMap<String, ((usize, KeyScope), String)> = BTreeMap::new();
    for (key, value) in merged {
        if key.starts_with('_') {
            continue;
        }
        let (name, scope) = clean_key(key);
        if name.is_empty() || name.starts_with('_') || CONSUMED_KEYS.contains(name.as_str()) {
            continue;
        }
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let precedence = (ranks.get(key).copied().unwrap_or(0), scope);
        match cleaned.get(&name) {
            Some((existing, _)) if *existing >= precedence => {}
            _ => {
                cleaned.insert(name, (precedence, value.to_string()));
            }
        }
    }
    cleaned
        .into_iter()
        .map(|(name, (_, value))| (name, value))
        .collect()
}

/// Merges the layers (context < locked < predicted) and resolves the descriptor.
pub fn resolve(
    context: Option<&AttributeLayer>,
    locked: Option<&AttributeLayer>,
    predicted: Option<&AttributeLayer>,
) -> ResolvedDescriptor {
    let (merged, ranks) = merge_layers([context, locked, predicted]);
    let mut notes = Vec::new();

    let (product_type, product_type_confidence) = extract_product_type(&merged, &mut notes);
    let product_group = first_present(&merged, PRODUCT_GROUP_KEYS);
    let customer_segment = first_present(&merged, CUSTOMER_SEGMENT_KEYS);
    let attributes = clean_attributes(&merged, &ranks);

    debug!(
        "Resolved descriptor: product_type={} confidence={:?} group={:?} segment={:?} attributes={}",
        product_type,
        product_type_confidence,
        product_group,
        customer_segment,
        attributes.len()
    );

    ResolvedDescriptor {
        product_type,
        product_type_confidence,
        product_group,
        customer_segment,
        attributes,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pairs: &[(&str, &str)]) -> AttributeLayer {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn predicted_overrides_locked_overrides_context() {
        let context = layer(&[("color", "Red"), ("material", "Wool"), ("fit", "Slim")]);
        let locked = layer(&[("color", "Blue"), ("material", "Linen")]);
        let predicted = layer(&[("color", "Green")]);

        let resolved = resolve(Some(&context), Some(&locked), Some(&predicted));
        assert_eq!(resolved.attributes["color"], "Green");
        assert_eq!(resolved.attributes["material"], "Linen");
        assert_eq!(resolved.attributes["fit"], "Slim");
    }

    #[test]
    fn explicit_product_type_beats_ontology_keys() {
        let predicted = layer(&[
            ("article_product_type", "Hoodie"),
            ("ontology_trousers_fit", "wide"),
            ("ontology_trousers_rise", "high"),
            ("ontology_trousers_length", "full"),
        ]);
        let resolved = resolve(None, None, Some(&predicted));
        assert_eq!(resolved.product_type, "Hoodie");
        assert_eq!(resolved.product_type_confidence, ProductTypeConfidence::High);
        assert!(!resolved.attributes.contains_key("product_type"));
    }

    #[test]
    fn highest_ontology_count_wins_with_medium_confidence() {
        let predicted = layer(&[
            ("ontology_dress_length", "midi"),
            ("ontology_t-shirt_neckline", "crew"),
            ("ontology_t-shirt_sleeve_length", "short"),
        ]);
        let resolved = resolve(None, None, Some(&predicted));
        assert_eq!(resolved.product_type, "T-Shirt");
        assert_eq!(
            resolved.product_type_confidence,
            ProductTypeConfidence::Medium
        );
        assert_eq!(resolved.notes.len(), 1);
        assert_eq!(resolved.attributes["sleeve_length"], "short");
        assert_eq!(resolved.attributes["length"], "midi");
    }

    #[test]
    fn ties_break_lexicographically() {
        let predicted = layer(&[
            ("ontology_skirt_length", "mini"),
            ("ontology_blazer_lapel", "notch"),
        ]);
        let resolved = resolve(None, None, Some(&predicted));
        assert_eq!(resolved.product_type, "Blazer");
    }

    #[test]
    fn single_ontology_type_is_high_confidence() {
        let predicted = layer(&[("ontology_jeans_wash", "stone")]);
        let resolved = resolve(None, None, Some(&predicted));
        assert_eq!(resolved.product_type, "Jeans");
        assert_eq!(resolved.product_type_confidence, ProductTypeConfidence::High);
        assert!(resolved.notes.is_empty());
    }

    #[test]
    fn falls_back_to_placeholder_when_no_type_is_found() {
        let resolved = resolve(Some(&layer(&[("color", "Black")])), None, None);
        assert_eq!(resolved.product_type, PLACEHOLDER_PRODUCT_TYPE);
        assert_eq!(resolved.product_type_confidence, ProductTypeConfidence::Low);
        assert_eq!(resolved.notes.len(), 1);
    }

    #[test]
    fn extracts_group_and_segment_by_candidate_order() {
        let context = layer(&[
            ("product_group_name", "Garment Upper body"),
            ("article_product_group_name", "  "),
            ("index_group_name", "Menswear"),
            ("article_customer_segment", "Divided"),
        ]);
        let resolved = resolve(Some(&context), None, None);
        assert_eq!(resolved.product_group.as_deref(), Some("Garment Upper body"));
        assert_eq!(resolved.customer_segment.as_deref(), Some("Divided"));
        assert!(resolved.attributes.is_empty());
    }

    #[test]
    fn cleaning_drops_internal_and_blank_values_and_strips_prefixes() {
        let predicted = layer(&[
            ("_confidence", "0.93"),
            ("_source", "vision"),
            ("article_pattern", "Striped"),
            ("ontology_shirt_collar", " button-down "),
            ("neckline", "   "),
        ]);
        let resolved = resolve(None, None, Some(&predicted));
        assert!(resolved.attributes.keys().all(|key| !key.starts_with('_')));
        assert_eq!(resolved.attributes["pattern"], "Striped");
        assert_eq!(resolved.attributes["collar"], "button-down");
        assert!(!resolved.attributes.contains_key("neckline"));
        assert!(resolved
            .attributes
            .values()
            .all(|value| !value.trim().is_empty()));
    }

    #[test]
    fn more_specific_scope_wins_on_collision() {
        let predicted = layer(&[
            ("color", "Red"),
            ("article_color", "Crimson"),
            ("ontology_dress_color", "Burgundy"),
            ("fit", "Loose"),
            ("article_fit", "Oversized"),
        ]);
        let resolved = resolve(None, None, Some(&predicted));
        assert_eq!(resolved.attributes["color"], "Burgundy");
        assert_eq!(resolved.attributes["fit"], "Oversized");
    }

    #[test]
    fn higher_layer_wins_collision_regardless_of_scope() {
        let context = layer(&[("ontology_hoodie_color", "Black")]);
        let locked = layer(&[("color", "Navy")]);
        let resolved = resolve(Some(&context), Some(&locked), None);
        assert_eq!(resolved.attributes["color"], "Navy");
        assert_eq!(resolved.product_type, "Hoodie");

        let predicted = layer(&[("article_fit", "Relaxed")]);
        let locked = layer(&[("ontology_hoodie_fit", "Boxy"), ("fit", "Slim")]);
        let resolved = resolve(None, Some(&locked), Some(&predicted));
        assert_eq!(resolved.attributes["fit"], "Relaxed");
    }

    #[test]
    fn resolve_is_idempotent() {
        let context = layer(&[("article_product_group_name", "Shoes")]);
        let predicted = layer(&[
            ("ontology_sneaker_sole", "rubber"),
            ("ontology_boot_shaft", "ankle"),
            ("_internal", "x"),
        ]);
        let first = resolve(Some(&context), None, Some(&predicted));
        let second = resolve(Some(&context), None, Some(&predicted));
        assert_eq!(first, second);
    }

    #[test]
    fn display_format_title_cases_hyphenated_segments() {
        assert_eq!(display_product_type("t-shirt"), "T-Shirt");
        assert_eq!(display_product_type("POLO"), "Polo");
        assert_eq!(display_product_type("tank-top"), "Tank-Top");
    }
}
