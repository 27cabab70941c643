//! Vision-attribute normalization.
//!
//! Vision models are asked for strict JSON but do not always comply. The
//! model's reply becomes an [`AnalysisOutcome`] and one normalization function
//! per schema turns it into a fully populated record. Missing signal resolves
//! to [`UNKNOWN`]; these functions never fail.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::model::{ClothingDetails, Measurements, PersonDetails};

/// Sentinel for attributes that could not be determined.
pub const UNKNOWN: &str = "Unknown";

pub const PERSON_SYSTEM_PROMPT: &str = "You are a vision assistant that MUST return only a single JSON object matching the specified schema. Never include extra text. If any value cannot be determined, set it to 'Unknown'.";

pub const PERSON_PROMPT: &str = r#"Analyze this person's image and produce ONLY a JSON object with this exact structure: { "bodyType": "Slim | Athletic | Average | Curvy | Plus Size | Unknown", "gender": "Male | Female | Non-binary | Unknown", "ageRange": "string (e.g., 20-30 or Unknown)", "height": "string (estimated in cm or Unknown)", "measurements": { "chest": "string (in cm or Unknown)", "waist": "string (in cm or Unknown)", "hips": "string (in cm or Unknown)", "shoulders": "string (in cm or Unknown)" }, "skinTone": "Fair | Medium | Olive | Dark | Tan | Light | Deep | Unknown", "pose": "Standing | Casual | Formal | Sitting | Walking | Running | Unknown", "analysisConfidence": "string (percentage or Unknown)" }. Do not add explanations. If unsure, use "Unknown"."#;

pub const CLOTHING_SYSTEM_PROMPT: &str = "You are a vision assistant that MUST return only a single JSON object matching the specified schema. Never include extra text. If any value cannot be determined, set it to 'Unknown' (or null for secondaryColor).";

pub const CLOTHING_PROMPT: &str = r#"Analyze this clothing item and produce ONLY a JSON object with this exact structure: { "type": "string | Unknown", "primaryColor": "string | Unknown", "secondaryColor": "string or null", "pattern": "string | Unknown", "material": "string | Unknown", "style": "string | Unknown", "fit": "string | Unknown", "sleeves": "string | Unknown", "neckline": "string | Unknown", "analysisConfidence": "string (percentage or Unknown)" }. Do not add explanations. If unsure, use "Unknown" and set secondaryColor to null when absent."#;

const BODY_TYPES: &[&str] = &["slim", "athletic", "average", "curvy", "plus size"];
// "female" contains "male", so the longer terms go first.
const GENDERS: &[&str] = &["non-binary", "female", "male"];
const SKIN_TONES: &[&str] = &["fair", "medium", "olive", "dark", "tan", "light", "deep"];
const POSES: &[&str] = &["standing", "casual", "formal", "sitting", "walking", "running"];

const CLOTHING_TYPES: &[&str] = &[
    "t-shirt", "tee", "shirt", "dress", "jacket", "sweater", "hoodie", "blouse", "pants", "jeans",
    "trousers", "shorts", "skirt", "coat", "cardigan",
];
const PATTERNS: &[&str] = &[
    "solid", "striped", "floral", "plaid", "checked", "polka dot", "graphic", "printed", "paisley",
    "animal print",
];
const MATERIALS: &[&str] = &[
    "cotton", "polyester", "silk", "linen", "wool", "denim", "leather", "rayon", "spandex", "nylon",
    "satin",
];
const STYLES: &[&str] = &[
    "casual", "formal", "streetwear", "sporty", "business casual", "vintage", "boho", "elegant",
    "minimalist", "smart",
];
const FITS: &[&str] = &["tight", "slim fit", "regular", "relaxed", "loose", "oversized", "boxy"];
const SLEEVES: &[&str] = &["short", "long", "sleeveless", "3/4", "three-quarter", "cap"];
const NECKLINES: &[&str] = &[
    "round", "crew", "v-neck", "scoop", "turtleneck", "collared", "button-down", "henley",
];
const COLORS: &[&str] = &[
    "black", "white", "gray", "grey", "red", "blue", "green", "yellow", "orange", "purple", "pink",
    "brown", "beige", "tan", "navy", "teal", "maroon", "olive", "gold", "silver",
];

static AGE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})\s*(?:-|–|to)\s*(\d{2})").expect("valid regex"));
static AGE_DECADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(early|mid|late)[\s-]*(\d)0s").expect("valid regex"));
static AGE_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bage[d]?\s*:?\s*(\d{2})").expect("valid regex"));
static HEIGHT_CM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2,3})\s*cm").expect("valid regex"));
static HEIGHT_M: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d.])(\d(?:\.\d{1,2})?)\s*m(?:eters?|etres?)?\b").expect("valid regex")
});
static HEIGHT_FT_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d)\s*(?:'|’|ft|feet|foot)\s*(\d{1,2})").expect("valid regex")
});
static CONFIDENCE_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2,3})%").expect("valid regex"));
static CONFIDENCE_STATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence[^\d]*(0?\.\d{1,2}|1(?:\.0+)?)|confidence[^\d]*(\d{1,3})")
        .expect("valid regex")
});

/// A vision model reply, classified once.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// The reply contained a JSON object.
    Parsed(Map<String, Value>),
    /// Free text to be scanned heuristically.
    Unparsed(String),
}

impl AnalysisOutcome {
    /// Classify a reply. The whole text is tried first, then each fenced
    /// code block, then the outermost `{...}` span.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let fenced = trimmed
            .split("```")
            .skip(1)
            .step_by(2)
            .map(|block| block.strip_prefix("json").unwrap_or(block).trim());
        let braced = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(open), Some(close)) if close > open => Some(&trimmed[open..=close]),
            _ => None,
        };

        std::iter::once(trimmed)
            .chain(fenced)
            .chain(braced)
            .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            })
            .map_or_else(|| Self::Unparsed(text.to_string()), Self::Parsed)
    }
}

pub fn normalize_person(outcome: &AnalysisOutcome) -> PersonDetails {
    match outcome {
        AnalysisOutcome::Parsed(map) => {
            let measurements = map.get("measurements").and_then(Value::as_object);
            let measurement = |key: &str| {
                measurements
                    .and_then(|m| scalar(m, &[key]))
                    .unwrap_or_else(unknown)
            };
            PersonDetails {
                body_type: field(map, &["bodyType", "body_type"]),
                gender: field(map, &["gender"]),
                age_range: field(map, &["ageRange", "age_range", "age"]),
                height: field(map, &["height"]),
                measurements: Measurements {
                    chest: measurement("chest"),
                    waist: measurement("waist"),
                    hips: measurement("hips"),
                    shoulders: measurement("shoulders"),
                },
                skin_tone: field(map, &["skinTone", "skin_tone"]),
                pose: field(map, &["pose"]),
                analysis_confidence: field(map, &["analysisConfidence", "confidence"]),
            }
        }
        AnalysisOutcome::Unparsed(text) => PersonDetails {
            body_type: extract_value(text, BODY_TYPES),
            gender: extract_value(text, GENDERS),
            age_range: extract_age_range(text),
            height: extract_height(text),
            measurements: Measurements {
                chest: extract_measurement(text, "chest"),
                waist: extract_measurement(text, "waist"),
                hips: extract_measurement(text, "hips"),
                shoulders: extract_measurement(text, "shoulders"),
            },
            skin_tone: extract_value(text, SKIN_TONES),
            pose: extract_value(text, POSES),
            analysis_confidence: extract_confidence(text),
        },
    }
}

pub fn normalize_clothing(outcome: &AnalysisOutcome) -> ClothingDetails {
    match outcome {
        AnalysisOutcome::Parsed(map) => ClothingDetails {
            clothing_type: field(map, &["type", "clothingType"]),
            primary_color: field(map, &["primaryColor", "primary_color", "color"]),
            secondary_color: scalar(map, &["secondaryColor", "secondary_color"]),
            pattern: field(map, &["pattern"]),
            material: field(map, &["material"]),
            style: field(map, &["style"]),
            fit: field(map, &["fit"]),
            sleeves: field(map, &["sleeves", "sleeveLength"]),
            neckline: field(map, &["neckline"]),
            analysis_confidence: field(map, &["analysisConfidence", "confidence"]),
        },
        AnalysisOutcome::Unparsed(text) => {
            let mut colors = extract_colors(text).into_iter();
            ClothingDetails {
                clothing_type: extract_value(text, CLOTHING_TYPES),
                primary_color: colors.next().unwrap_or_else(unknown),
                secondary_color: colors.next(),
                pattern: extract_value(text, PATTERNS),
                material: extract_value(text, MATERIALS),
                style: extract_value(text, STYLES),
                fit: extract_value(text, FITS),
                sleeves: extract_value(text, SLEEVES),
                neckline: extract_value(text, NECKLINES),
                analysis_confidence: extract_confidence(text),
            }
        }
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

fn field(map: &Map<String, Value>, keys: &[&str]) -> String {
    scalar(map, keys).unwrap_or_else(unknown)
}

/// First present, non-empty scalar among `keys`, stringified.
fn scalar(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// First vocabulary entry contained in `text`, case-insensitively.
pub fn extract_value(text: &str, options: &[&str]) -> String {
    let lower = text.to_lowercase();
    options
        .iter()
        .find(|option| lower.contains(&option.to_lowercase()))
        .map(|option| capitalize(option))
        .unwrap_or_else(unknown)
}

/// Age range from "25-34", "20 to 30", "mid 20s" or "age 27".
///
/// Decade phrases are anchored at the middle of the decade (20s → 25) and
/// offset by early (0, 3), mid (2, 7) or late (6, 9).
pub fn extract_age_range(text: &str) -> String {
    let lower = text.to_lowercase();
    if let Some(caps) = AGE_RANGE.captures(&lower) {
        return format!("{}-{}", &caps[1], &caps[2]);
    }
    if let Some(caps) = AGE_DECADE.captures(&lower) {
        let decade: u32 = caps[2].parse().unwrap_or(0) * 10;
        let base = decade + 5;
        let (low, high) = match &caps[1] {
            "early" => (0, 3),
            "mid" => (2, 7),
            _ => (6, 9),
        };
        return format!("{}-{}", base + low, base + high);
    }
    if let Some(caps) = AGE_SINGLE.captures(&lower) {
        if let Ok(age) = caps[1].parse::<u32>() {
            return format!("{}-{}", age.saturating_sub(2), age + 2);
        }
    }
    unknown()
}

/// Height in centimetres from "170 cm", "1.75 m" or 5'9".
pub fn extract_height(text: &str) -> String {
    let lower = text.to_lowercase();
    if let Some(caps) = HEIGHT_CM.captures(&lower) {
        return format!("{}cm", &caps[1]);
    }
    if let Some(meters) = HEIGHT_M
        .captures(&lower)
        .and_then(|caps| caps[1].parse::<f64>().ok())
    {
        return format!("{}cm", (meters * 100.0).round() as u32);
    }
    if let Some(caps) = HEIGHT_FT_IN.captures(&lower) {
        let feet: u32 = caps[1].parse().unwrap_or(0);
        let inches: u32 = caps[2].parse().unwrap_or(0);
        let total = (f64::from(feet * 12 + inches) * 2.54).round() as u32;
        return format!("{}cm", total);
    }
    unknown()
}

/// Centimetre measurement stated after a body part name.
pub fn extract_measurement(text: &str, part: &str) -> String {
    let pattern = format!(
        r"(?i){}[^\n\r:]*?:?\s*(\d{{2,3}})\s*(?:cm|centimeters|centimetres)",
        regex::escape(part)
    );
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(text).map(|caps| format!("{}cm", &caps[1])))
        .unwrap_or_else(unknown)
}

/// Up to two color words, in vocabulary order.
pub fn extract_colors(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    COLORS
        .iter()
        .filter(|color| lower.contains(*color))
        .take(2)
        .map(|color| capitalize(color))
        .collect()
}

/// Confidence as a clamped percentage from "85%" or "confidence: 0.85".
pub fn extract_confidence(text: &str) -> String {
    let clamp = |value: f64| format!("{}%", value.round().clamp(0.0, 100.0) as u32);

    if let Some(caps) = CONFIDENCE_PERCENT.captures(text) {
        if let Ok(value) = caps[1].parse::<f64>() {
            return clamp(value);
        }
    }
    if let Some(caps) = CONFIDENCE_STATED.captures(text) {
        let value = match (caps.get(1), caps.get(2)) {
            (Some(fraction), _) => fraction.as_str().parse::<f64>().ok().map(|v| v * 100.0),
            (None, Some(whole)) => whole.as_str().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(value) = value {
            return clamp(value);
        }
    }
    unknown()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_ranges() {
        assert_eq!(extract_age_range("Looks to be in her mid 20s"), "27-32");
        assert_eq!(extract_age_range("estimated 28-34 years"), "28-34");
        assert_eq!(extract_age_range("between 30 to 40"), "30-40");
        assert_eq!(extract_age_range("age 27"), "25-29");
        assert_eq!(extract_age_range("average build"), "Unknown");
        assert_eq!(extract_age_range("a smiling person"), "Unknown");
    }

    #[test]
    fn test_heights() {
        assert_eq!(extract_height("about 5'9\" tall"), "175cm");
        assert_eq!(extract_height("170 cm"), "170cm");
        assert_eq!(extract_height("roughly 1.8 m"), "180cm");
        assert_eq!(extract_height("25 male, slim"), "Unknown");
    }

    #[test]
    fn test_measurements_and_confidence() {
        let text = "Chest: 92 cm, waist around 74cm, hips 98 centimeters. Confidence: 0.82";
        assert_eq!(extract_measurement(text, "chest"), "92cm");
        assert_eq!(extract_measurement(text, "waist"), "74cm");
        assert_eq!(extract_measurement(text, "hips"), "98cm");
        assert_eq!(extract_measurement(text, "shoulders"), "Unknown");
        assert_eq!(extract_confidence(text), "82%");
        assert_eq!(extract_confidence("about 85% sure"), "85%");
        assert_eq!(extract_confidence("confidence 140"), "100%");
        assert_eq!(extract_confidence("no idea"), "Unknown");
    }

    #[test]
    fn test_parsed_person_fills_missing_keys() {
        let outcome = AnalysisOutcome::from_text(
            r#"{"bodyType":"Athletic","ageRange":"25-30","measurements":{"waist":"76cm"},"analysisConfidence":90}"#,
        );
        assert!(matches!(outcome, AnalysisOutcome::Parsed(_)));
        let person = normalize_person(&outcome);
        assert_eq!(person.body_type, "Athletic");
        assert_eq!(person.gender, "Unknown");
        assert_eq!(person.measurements.waist, "76cm");
        assert_eq!(person.measurements.chest, "Unknown");
        assert_eq!(person.analysis_confidence, "90");
    }

    #[test]
    fn test_fenced_json_is_parsed() {
        let outcome = AnalysisOutcome::from_text(
            "Here you go:\n```json\n{\"type\":\"Dress\",\"primaryColor\":\"Red\"}\n```",
        );
        let clothing = normalize_clothing(&outcome);
        assert_eq!(clothing.clothing_type, "Dress");
        assert_eq!(clothing.primary_color, "Red");
        assert_eq!(clothing.secondary_color, None);
        assert_eq!(clothing.neckline, "Unknown");
    }

    #[test]
    fn test_json_in_plain_fence_or_prose() {
        let plain = AnalysisOutcome::from_text("```\n{\"bodyType\":\"Petite\"}\n```");
        assert_eq!(normalize_person(&plain).body_type, "Petite");

        let prose = AnalysisOutcome::from_text(
            "Sure! The analysis is {\"bodyType\":\"Curvy\",\"gender\":\"Female\"} as requested.",
        );
        assert!(matches!(prose, AnalysisOutcome::Parsed(_)));
        assert_eq!(normalize_person(&prose).gender, "Female");
    }

    #[test]
    fn test_invalid_json_falls_back_to_text() {
        let outcome = AnalysisOutcome::from_text(
            "{bodyType: curvy, a female in her late 30s, standing, fair skin, 165 cm",
        );
        assert!(matches!(outcome, AnalysisOutcome::Unparsed(_)));
        let person = normalize_person(&outcome);
        assert_eq!(person.body_type, "Curvy");
        assert_eq!(person.gender, "Female");
        assert_eq!(person.age_range, "41-44");
        assert_eq!(person.height, "165cm");
        assert_eq!(person.pose, "Standing");
        assert_eq!(person.skin_tone, "Fair");
        assert_eq!(person.analysis_confidence, "Unknown");
    }

    #[test]
    fn test_unparsed_clothing() {
        let outcome = AnalysisOutcome::Unparsed(
            "A navy and white striped cotton shirt, relaxed fit with long sleeves and a crew neck"
                .to_string(),
        );
        let clothing = normalize_clothing(&outcome);
        assert_eq!(clothing.clothing_type, "Shirt");
        assert_eq!(clothing.primary_color, "White");
        assert_eq!(clothing.secondary_color.as_deref(), Some("Navy"));
        assert_eq!(clothing.pattern, "Striped");
        assert_eq!(clothing.material, "Cotton");
        assert_eq!(clothing.fit, "Relaxed");
        assert_eq!(clothing.sleeves, "Long");
        assert_eq!(clothing.neckline, "Crew");
    }

    #[test]
    fn test_empty_reply_is_all_unknown() {
        let person = normalize_person(&AnalysisOutcome::from_text(""));
        assert_eq!(person.body_type, UNKNOWN);
        assert_eq!(person.measurements.shoulders, UNKNOWN);
        let clothing = normalize_clothing(&AnalysisOutcome::from_text("[1, 2]"));
        assert_eq!(clothing.primary_color, UNKNOWN);
        assert_eq!(clothing.secondary_color, None);
    }
}
