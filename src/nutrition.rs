//! Nutrition values shared by the estimator, the store and the formatter.

/// Calories and macronutrients of one meal or one aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Nutrients {
    pub calories: i64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

impl Nutrients {
    /// Share of energy coming from protein, fat and carbs, in percent.
    ///
    /// Uses 4/9/4 kcal per gram. Returns `None` when no macros are recorded.
    pub fn macro_balance(&self) -> Option<(f64, f64, f64)> {
        let protein = self.protein_g * 4.0;
        let fat = self.fat_g * 9.0;
        let carbs = self.carbs_g * 4.0;
        let total = protein + fat + carbs;
        if total <= 0.0 {
            return None;
        }
        Some((protein / total * 100.0, fat / total * 100.0, carbs / total * 100.0))
    }
}

/// Which estimator tier produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    LocalDb,
    OpenRouter,
    FallbackEstimate,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::LocalDb => "local_db",
            Provenance::OpenRouter => "openrouter",
            Provenance::FallbackEstimate => "fallback_estimate",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "local_db" => Some(Provenance::LocalDb),
            "openrouter" => Some(Provenance::OpenRouter),
            "fallback_estimate" => Some(Provenance::FallbackEstimate),
            _ => None,
        }
    }
}

/// Normalized estimator output.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionRecord {
    pub nutrients: Nutrients,
    pub advice: String,
    pub provenance: Provenance,
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_balance_sums_to_hundred() {
        let n = Nutrients { calories: 400, protein_g: 20.0, fat_g: 10.0, carbs_g: 50.0 };
        let (p, f, c) = n.macro_balance().unwrap();
        assert!((p + f + c - 100.0).abs() < 1e-9);
        assert!(c > p);
    }

    #[test]
    fn test_macro_balance_empty() {
        assert!(Nutrients::default().macro_balance().is_none());
    }

    #[test]
    fn test_provenance_tags() {
        for p in [Provenance::LocalDb, Provenance::OpenRouter, Provenance::FallbackEstimate] {
            assert_eq!(Provenance::parse(p.as_str()), Some(p));
        }
        assert_eq!(Provenance::parse("gpt"), None);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(24.04), 24.0);
        assert_eq!(round1(7.25), 7.3);
    }
}
