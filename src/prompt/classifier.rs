//! Photography category and model profile derivation.
//!
//! Both lookups run against an injected [`ClassifierTable`]; the built-in table
//! can be replaced with a YAML file carrying the same shape.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::prompt::types::{Gender, ModelProfile, PhotographyCategory};

pub const BUILTIN_TABLE_VERSION: &str = "2024.2";

/// Reverse containment (key contains input) needs at least this many characters.
const MIN_REVERSE_MATCH_LEN: usize = 3;

/// Hyphenated runs stay one word, so `shirt` never matches inside `t-shirt`.
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:-[\p{L}\p{N}]+)*").expect("valid word regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryRule {
    pub keyword: String,
    pub category: PhotographyCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassifierTable {
    pub version: String,
    #[serde(default = "default_category")]
    pub default_category: PhotographyCategory,
    pub categories: Vec<CategoryRule>,
    #[serde(default)]
    pub male_keywords: Vec<String>,
    #[serde(default)]
    pub female_keywords: Vec<String>,
    #[serde(default = "default_gender")]
    pub default_gender: Gender,
}

const fn default_category() -> PhotographyCategory {
    PhotographyCategory::Wearable
}

const fn default_gender() -> Gender {
    Gender::Female
}

const WEARABLE_KEYWORDS: &[&str] = &[
    "garment upper body",
    "garment lower body",
    "garment full body",
    "t-shirt",
    "shirt",
    "blouse",
    "top",
    "vest top",
    "tank top",
    "polo shirt",
    "sweater",
    "sweatshirt",
    "hoodie",
    "cardigan",
    "jacket",
    "coat",
    "blazer",
    "dress",
    "jumpsuit",
    "bodysuit",
    "skirt",
    "trousers",
    "jeans",
    "shorts",
    "leggings",
    "underwear",
    "bra",
    "swimwear",
    "swimsuit",
    "bikini",
    "nightwear",
    "pyjama",
    "socks & tights",
    "socks",
];

const FOOTWEAR_KEYWORDS: &[&str] = &[
    "shoes",
    "sneakers",
    "trainers",
    "boots",
    "booties",
    "mules",
    "clogs",
    "sandals",
    "heels",
    "pumps",
    "loafers",
    "ballerinas",
    "slippers",
    "flip flop",
    "espadrilles",
];

const ACCESSORY_KEYWORDS: &[&str] = &[
    "accessories",
    "bag",
    "bags",
    "backpack",
    "belt",
    "hat",
    "cap",
    "beanie",
    "scarf",
    "gloves",
    "sunglasses",
    "jewellery",
    "necklace",
    "earring",
    "bracelet",
    "ring",
    "watch",
    "wallet",
    "hair accessories",
    "tie",
    "umbrella",
];

const NON_WEARABLE_KEYWORDS: &[&str] = &[
    "items",
    "furniture",
    "stationery",
    "interior textile",
    "cushion",
    "blanket",
    "candle",
    "cosmetic",
    "garment and shoe care",
    "fun",
];

const MALE_KEYWORDS: &[&str] = &["men", "man", "male", "boys", "boy", "menswear", "gents"];

const FEMALE_KEYWORDS: &[&str] = &[
    "women",
    "woman",
    "female",
    "girls",
    "girl",
    "ladies",
    "lady",
    "ladieswear",
    "womenswear",
];

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn words(value: &str) -> Vec<&str> {
    WORD_RE.find_iter(value).map(|word| word.as_str()).collect()
}

fn is_plural_of(singular: &str, plural: &str) -> bool {
    if let Some(stem) = plural.strip_suffix("ies") {
        if singular.strip_suffix('y') == Some(stem) {
            return true;
        }
    }
    plural
        .strip_prefix(singular)
        .map_or(false, |suffix| suffix == "s" || suffix == "es")
}

fn same_word(left: &str, right: &str) -> bool {
    left == right || is_plural_of(left, right) || is_plural_of(right, left)
}

/// Whether `needle` appears in `haystack` as a run of whole words, tolerating
/// singular/plural differences per word.
fn contains_phrase(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| {
        window
            .iter()
            .zip(needle)
            .all(|(left, right)| same_word(left, right))
    })
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for ClassifierTable {
    fn default() -> Self {
        let groups = [
            (WEARABLE_KEYWORDS, PhotographyCategory::Wearable),
            (FOOTWEAR_KEYWORDS, PhotographyCategory::Footwear),
            (ACCESSORY_KEYWORDS, PhotographyCategory::Accessories),
            (NON_WEARABLE_KEYWORDS, PhotographyCategory::NonWearable),
        ];
        let categories = groups
            .iter()
            .flat_map(|(keywords, category)| {
                keywords.iter().map(move |keyword| CategoryRule {
                    keyword: keyword.to_string(),
                    category: *category,
                })
            })
            .collect();

        ClassifierTable {
            version: BUILTIN_TABLE_VERSION.to_string(),
            default_category: default_category(),
            categories,
            male_keywords: to_strings(MALE_KEYWORDS),
            female_keywords: to_strings(FEMALE_KEYWORDS),
            default_gender: default_gender(),
        }
    }
}

impl ClassifierTable {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let parsed: ClassifierTable =
            serde_yaml::from_str(raw).context("invalid classifier table")?;
        Ok(parsed.normalized())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml(&raw)
    }

    fn normalized(mut self) -> Self {
        self.categories = self
            .categories
            .into_iter()
            .map(|rule| CategoryRule {
                keyword: normalize(&rule.keyword),
                category: rule.category,
            })
            .filter(|rule| !rule.keyword.is_empty())
            .collect();
        for keywords in [&mut self.male_keywords, &mut self.female_keywords] {
            *keywords = keywords
                .iter()
                .map(|keyword| normalize(keyword))
                .filter(|keyword| !keyword.is_empty())
                .collect();
        }
        self
    }

    fn exact_match(&self, input: &str) -> Option<PhotographyCategory> {
        self.categories
            .iter()
            .find(|rule| rule.keyword == input)
            .map(|rule| rule.category)
    }

    /// Longest keyword that contains, or is contained in, the input, compared
    /// word by word. Ties keep table order.
    fn containment_match(&self, input: &str) -> Option<PhotographyCategory> {
        let input_words = words(input);
        let allow_reverse = input.chars().count() >= MIN_REVERSE_MATCH_LEN;
        let mut best: Option<&CategoryRule> = None;
        for rule in &self.categories {
            let keyword_words = words(&rule.keyword);
            let matches = contains_phrase(&input_words, &keyword_words)
                || (allow_reverse && contains_phrase(&keyword_words, &input_words));
            if !matches {
                continue;
            }
            if best.map_or(true, |current| rule.keyword.len() > current.keyword.len()) {
                best = Some(rule);
            }
        }
        best.map(|rule| rule.category)
    }

    pub fn classify(
        &self,
        product_group: Option<&str>,
        product_type: &str,
    ) -> PhotographyCategory {
        let candidates = [Some(product_type), product_group]
            .into_iter()
            .flatten()
            .map(normalize)
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>();

        let category = candidates
            .iter()
            .find_map(|candidate| self.exact_match(candidate))
            .or_else(|| {
                candidates
                    .iter()
                    .find_map(|candidate| self.containment_match(candidate))
            })
            .unwrap_or(self.default_category);

        debug!(
            "Classified product_type='{}' group={:?} as {} (table {})",
            product_type,
            product_group,
            category.as_str(),
            self.version
        );
        category
    }

    pub fn model_profile(&self, customer_segment: Option<&str>) -> ModelProfile {
        let segment = customer_segment.map(normalize).unwrap_or_default();
        let contains_any =
            |keywords: &[String]| keywords.iter().any(|keyword| segment.contains(keyword.as_str()));

        // Female keywords first: "women" and "womenswear" contain the male ones.
        let gender = if segment.is_empty() {
            self.default_gender
        } else if contains_any(self.female_keywords.as_slice()) {
            Gender::Female
        } else if contains_any(self.male_keywords.as_slice()) {
            Gender::Male
        } else {
            self.default_gender
        };
        ModelProfile::for_gender(gender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_product_type_match() {
        let table = ClassifierTable::default();
        assert_eq!(
            table.classify(None, "Hoodie"),
            PhotographyCategory::Wearable
        );
        assert_eq!(
            table.classify(None, "Sneakers"),
            PhotographyCategory::Footwear
        );
        assert_eq!(
            table.classify(None, "Umbrella"),
            PhotographyCategory::Accessories
        );
    }

    #[test]
    fn product_type_takes_priority_over_group() {
        let table = ClassifierTable::default();
        assert_eq!(
            table.classify(Some("Garment Upper body"), "Bag"),
            PhotographyCategory::Accessories
        );
    }

    #[test]
    fn falls_back_to_group_when_type_is_unknown() {
        let table = ClassifierTable::default();
        assert_eq!(
            table.classify(Some("Furniture"), "Product"),
            PhotographyCategory::NonWearable
        );
    }

    #[test]
    fn containment_matches_in_both_directions() {
        let table = ClassifierTable::default();
        assert_eq!(
            table.classify(None, "Leather Shoulder Bag"),
            PhotographyCategory::Accessories
        );
        assert_eq!(
            table.classify(None, "sneaker"),
            PhotographyCategory::Footwear
        );
        assert_eq!(
            table.classify(None, "Capri Trousers"),
            PhotographyCategory::Wearable
        );
    }

    #[test]
    fn containment_ignores_keywords_inside_other_words() {
        let table = ClassifierTable::default();
        for product_type in ["Panties", "Capri", "Short Sleeve Top"] {
            assert_eq!(
                table.classify(None, product_type),
                PhotographyCategory::Wearable,
                "{product_type}"
            );
        }
        assert_eq!(
            table.classify(None, "Laptop Bag"),
            PhotographyCategory::Accessories
        );
        assert_eq!(
            table.classify(None, "Bootie"),
            PhotographyCategory::Footwear
        );
    }

    #[test]
    fn containment_tolerates_singular_and_plural() {
        let table = ClassifierTable::default();
        for product_type in ["Flat shoe", "Leather Shoe", "Other shoe", "Chelsea boot"] {
            assert_eq!(
                table.classify(None, product_type),
                PhotographyCategory::Footwear,
                "{product_type}"
            );
        }
        assert_eq!(
            table.classify(None, "Hair Accessory"),
            PhotographyCategory::Accessories
        );
        assert_eq!(
            table.classify(None, "Wrap Dresses"),
            PhotographyCategory::Wearable
        );
    }

    #[test]
    fn unmatched_input_uses_default_category() {
        let table = ClassifierTable::default();
        assert_eq!(
            table.classify(None, "Zzyzx"),
            PhotographyCategory::Wearable
        );
    }

    #[test]
    fn model_profile_handles_overlapping_keywords() {
        let table = ClassifierTable::default();
        assert_eq!(
            table.model_profile(Some("Womenswear")).gender,
            Gender::Female
        );
        assert_eq!(table.model_profile(Some("MENSWEAR")).gender, Gender::Male);
        assert_eq!(table.model_profile(Some("Boys 2-8Y")).gender, Gender::Male);
        assert_eq!(
            table.model_profile(Some("Ladieswear")).descriptor,
            "female model"
        );
    }

    #[test]
    fn model_profile_defaults_when_nothing_matches() {
        let table = ClassifierTable::default();
        assert_eq!(table.model_profile(None).gender, Gender::Female);
        assert_eq!(table.model_profile(Some("Sport")).gender, Gender::Female);
    }

    #[test]
    fn loads_table_from_yaml() {
        let raw = r#"
version: "test-1"
default_category: non_wearable
categories:
  - keyword: "  Kimono  "
    category: wearable
  - keyword: Clogs
    category: footwear
male_keywords: [Homme]
female_keywords: [Femme]
default_gender: male
"#;
        let table = ClassifierTable::from_yaml(raw).unwrap();
        assert_eq!(table.version, "test-1");
        assert_eq!(table.categories[0].keyword, "kimono");
        assert_eq!(
            table.classify(None, "kimono"),
            PhotographyCategory::Wearable
        );
        assert_eq!(
            table.classify(None, "Hoodie"),
            PhotographyCategory::NonWearable
        );
        assert_eq!(table.model_profile(Some("femme")).gender, Gender::Female);
        assert_eq!(table.model_profile(Some("kids")).gender, Gender::Male);
    }

    #[test]
    fn bundled_sample_table_parses() {
        let table =
            ClassifierTable::from_yaml(include_str!("../../config/classifier_table.yaml")).unwrap();
        assert_eq!(table.version, "2024.1-local");
        assert_eq!(
            table.classify(Some("Shoes"), "Ankle Boots"),
            PhotographyCategory::Footwear
        );
        assert_eq!(
            table.model_profile(Some("Menswear")).gender,
            Gender::Male
        );
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(ClassifierTable::from_yaml("categories: [").is_err());
    }
}
