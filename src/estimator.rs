//! Nutrition estimates for free-form meal descriptions.
//!
//! Three tiers are tried in order: the built-in product table, an OpenRouter
//! completion (only with an API key), then a keyword heuristic. The estimator
//! itself never fails.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::nutrition::{Nutrients, NutritionRecord, Provenance, round1};
use crate::openrouter::{self, Message, Sampling};

const REMOTE_MODEL: &str = "openai/gpt-3.5-turbo";
const REMOTE_SAMPLING: Sampling = Sampling { temperature: 0.3, max_tokens: 500 };

const DIETITIAN_PROMPT: &str = r#"Ты профессиональный диетолог. Отвечай ТОЛЬКО в JSON:

{
  "calories": число,
  "protein_g": число,
  "fat_g": число,
  "carbs_g": число,
  "advice": "краткий совет на русском"
}

Если вес не указан - используй средние порции. Будь точным и реалистичным."#;

const DEFAULT_WEIGHT_G: u32 = 100;

/// Per-100 g values: name, kcal, protein, fat, carbs.
const LOCAL_TABLE: &[(&str, f64, f64, f64, f64)] = &[
    ("овсянка", 350.0, 12.0, 6.0, 60.0),
    ("творог", 120.0, 18.0, 5.0, 4.0),
    ("куриная грудка", 165.0, 31.0, 3.6, 0.0),
    ("гречка", 130.0, 4.5, 1.3, 27.0),
    ("яйцо", 70.0, 6.0, 5.0, 0.6),
];

/// Keyword buckets of the heuristic tier: stems, kcal per 100 g, advice.
const HEURISTIC_BUCKETS: &[(&[&str], i64, &str)] = &[
    (&["каша", "овсянк", "гречк"], 150, "Каши дают длительную энергию."),
    (&["мясо", "куриц", "говядин"], 180, "Мясо богато белком."),
    (&["салат", "овощ"], 100, "Овощи содержат витамины."),
];
const HEURISTIC_DEFAULT: (i64, &str) = (250, "Сбалансированное блюдо.");

static WEIGHT_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [r"([0-9]+)\s*г\b", r"([0-9]+)\s*грамм", r"([0-9]+)\s*гр\b"].map(|p| Regex::new(p).unwrap())
});

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z_]\w*)\s*:").unwrap());

#[derive(Clone, Default)]
pub struct Estimator {
    llm: Option<openrouter::Client>,
}

impl Estimator {
    pub fn new(llm: Option<openrouter::Client>) -> Self {
        Self { llm }
    }

    pub async fn estimate(&self, description: &str) -> NutritionRecord {
        if let Some(record) = local_lookup(description) {
            return record;
        }

        if let Some(client) = &self.llm {
            match remote_estimate(client, description).await {
                Ok(record) => return record,
                Err(e) => warn!("Remote estimate failed, using heuristic: {e}"),
            }
        }

        heuristic(description)
    }
}

#[derive(Debug, thiserror::Error)]
enum RemoteError {
    #[error(transparent)]
    Upstream(#[from] openrouter::Error),
    #[error("reply has no usable nutrition object")]
    Unparseable,
}

async fn remote_estimate(client: &openrouter::Client, description: &str) -> Result<NutritionRecord, RemoteError> {
    let messages = [
        Message::system(DIETITIAN_PROMPT),
        Message::user(format!("Оцени КБЖУ для: {description}")),
    ];
    let completion = client.chat(REMOTE_MODEL, &messages, REMOTE_SAMPLING).await?;
    info!(
        "🤖 Nutrition estimate in {} ms for {:?}",
        completion.elapsed.as_millis(),
        description.chars().take(50).collect::<String>()
    );
    parse_completion(&completion.content).ok_or(RemoteError::Unparseable)
}

/// Grams mentioned in the text, 100 when none.
pub fn extract_weight(text: &str) -> u32 {
    let lower = text.to_lowercase();
    WEIGHT_PATTERNS
        .iter()
        .find_map(|re| re.captures(&lower).and_then(|c| c[1].parse().ok()))
        .unwrap_or(DEFAULT_WEIGHT_G)
}

/// First table product contained in the text, scaled by weight.
pub fn local_lookup(description: &str) -> Option<NutritionRecord> {
    let lower = description.to_lowercase();
    let &(_, kcal, protein, fat, carbs) = LOCAL_TABLE.iter().find(|(name, ..)| lower.contains(name))?;
    let factor = f64::from(extract_weight(&lower)) / 100.0;

    Some(NutritionRecord {
        nutrients: Nutrients {
            calories: (kcal * factor) as i64,
            protein_g: round1(protein * factor),
            fat_g: round1(fat * factor),
            carbs_g: round1(carbs * factor),
        },
        advice: "Данные из локальной базы продуктов".to_string(),
        provenance: Provenance::LocalDb,
    })
}

/// Keyword estimate; macros split 20/30/50 % of energy.
pub fn heuristic(description: &str) -> NutritionRecord {
    let lower = description.to_lowercase();
    let (per_100g, advice) = HEURISTIC_BUCKETS
        .iter()
        .find(|(stems, ..)| stems.iter().any(|stem| lower.contains(stem)))
        .map(|&(_, kcal, advice)| (kcal, advice))
        .unwrap_or(HEURISTIC_DEFAULT);

    let calories = per_100g * i64::from(extract_weight(&lower)) / 100;
    let kcal = calories as f64;

    NutritionRecord {
        nutrients: Nutrients {
            calories,
            protein_g: round1(kcal * 0.2 / 4.0),
            fat_g: round1(kcal * 0.3 / 9.0),
            carbs_g: round1(kcal * 0.5 / 4.0),
        },
        advice: format!("{advice} (примерная оценка)"),
        provenance: Provenance::FallbackEstimate,
    }
}

/// Pull the nutrition object out of a model reply.
///
/// Tolerates code fences, surrounding prose, single quotes and bare keys.
pub fn parse_completion(content: &str) -> Option<NutritionRecord> {
    let cleaned = content.replace("```json", "").replace("```", "");
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    let candidate = &cleaned[start..=end];

    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(_) => {
            let repaired = candidate.replace('\'', "\"");
            let repaired = BARE_KEY.replace_all(&repaired, "${1}\"${2}\":");
            serde_json::from_str(&repaired).ok()?
        }
    };
    let object = value.as_object()?;

    let number = |key: &str| -> Option<f64> {
        let n = match object.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        (n.is_finite() && n >= 0.0).then_some(n)
    };

    let advice = match object.get("advice")? {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };

    Some(NutritionRecord {
        nutrients: Nutrients {
            calories: number("calories")?.round() as i64,
            protein_g: round1(number("protein_g")?),
            fat_g: round1(number("fat_g")?),
            carbs_g: round1(number("carbs_g")?),
        },
        advice,
        provenance: Provenance::OpenRouter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_extract_weight() {
        assert_eq!(extract_weight("овсянка 200г"), 200);
        assert_eq!(extract_weight("рис 150 грамм"), 150);
        assert_eq!(extract_weight("суп 300 гр"), 300);
        assert_eq!(extract_weight("Творог 250 Г"), 250);
        assert_eq!(extract_weight("2 яйца"), 100);
    }

    #[test]
    fn test_local_lookup_scales_by_weight() {
        let record = local_lookup("Овсянка 200г на молоке").unwrap();
        assert_eq!(record.provenance, Provenance::LocalDb);
        assert_eq!(record.nutrients.calories, 700);
        assert_eq!(record.nutrients.protein_g, 24.0);
        assert_eq!(record.nutrients.fat_g, 12.0);
        assert_eq!(record.nutrients.carbs_g, 120.0);
    }

    #[test]
    fn test_local_lookup_truncates_calories() {
        let record = local_lookup("куриная грудка 150 грамм").unwrap();
        assert_eq!(record.nutrients.calories, 247);
        assert_eq!(record.nutrients.protein_g, 46.5);
        assert_eq!(record.nutrients.fat_g, 5.4);
    }

    #[test]
    fn test_local_lookup_uses_table_order() {
        // Both products match; the earlier table row wins.
        let record = local_lookup("творог и овсянка").unwrap();
        assert_eq!(record.nutrients.calories, 350);
        assert!(local_lookup("борщ").is_none());
    }

    #[test]
    fn test_heuristic_buckets() {
        let salad = heuristic("Салат из овощей");
        assert_eq!(salad.provenance, Provenance::FallbackEstimate);
        assert_eq!(salad.nutrients.calories, 100);
        assert_eq!(salad.nutrients.protein_g, 5.0);
        assert_eq!(salad.nutrients.fat_g, 3.3);
        assert_eq!(salad.nutrients.carbs_g, 12.5);
        assert_eq!(salad.advice, "Овощи содержат витамины. (примерная оценка)");

        assert_eq!(heuristic("говядина тушеная").nutrients.calories, 180);
        assert_eq!(heuristic("манная каша 200г").nutrients.calories, 300);
        assert_eq!(heuristic("борщ 300 гр").nutrients.calories, 750);
    }

    #[test]
    fn test_parse_completion_with_fences_and_prose() {
        let reply = "Вот оценка:\n```json\n{\"calories\": 420, \"protein_g\": 18.25, \"fat_g\": 12, \"carbs_g\": \"55.5\", \"advice\": \"Добавьте овощей\"}\n```";
        let record = parse_completion(reply).unwrap();
        assert_eq!(record.provenance, Provenance::OpenRouter);
        assert_eq!(record.nutrients.calories, 420);
        assert_eq!(record.nutrients.protein_g, 18.3);
        assert_eq!(record.nutrients.carbs_g, 55.5);
        assert_eq!(record.advice, "Добавьте овощей");
    }

    #[test]
    fn test_parse_completion_repairs_loose_json() {
        let reply = "{calories: 300, protein_g: 10, fat_g: 8, carbs_g: 40, advice: 'Хороший выбор'}";
        let record = parse_completion(reply).unwrap();
        assert_eq!(record.nutrients.calories, 300);
        assert_eq!(record.advice, "Хороший выбор");
    }

    #[test]
    fn test_parse_completion_rejects_incomplete() {
        assert!(parse_completion(r#"{"calories": 300, "advice": "ok"}"#).is_none());
        assert!(parse_completion(r#"{"calories": -5, "protein_g": 1, "fat_g": 1, "carbs_g": 1, "advice": "x"}"#).is_none());
        assert!(parse_completion("Не могу оценить").is_none());
        assert!(parse_completion("} oops {").is_none());
    }

    #[tokio::test]
    async fn test_estimate_without_key_skips_remote() {
        let estimator = Estimator::default();
        assert_eq!(estimator.estimate("яйцо").await.provenance, Provenance::LocalDb);
        assert_eq!(estimator.estimate("пицца").await.provenance, Provenance::FallbackEstimate);
    }

    #[tokio::test]
    async fn test_estimate_falls_back_when_remote_unreachable() {
        let client = openrouter::Client::new("key".into(), Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:9/api/v1");
        let estimator = Estimator::new(Some(client));
        let record = estimator.estimate("пицца 200г").await;
        assert_eq!(record.provenance, Provenance::FallbackEstimate);
        assert_eq!(record.nutrients.calories, 500);
    }
}
