//! Statistics over per-day food totals.

use crate::store::PeriodTotals;

const HIGH_VARIABILITY_RATIO: f64 = 0.3;
const RISING_RATIO: f64 = 1.15;
const FALLING_RATIO: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub enum WeeklyAnalysis {
    /// No day with a non-zero calorie total.
    InsufficientData,
    Stats(CalorieStats),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalorieStats {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub spread: i64,
    /// Only computed from three data points on.
    pub variability: Option<Variability>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variability {
    pub std_dev: f64,
    pub high: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    TooFewCalories,
    HighIntake,
    NormalIntake,
    AddProtein,
    AddFat,
    AddCarbs,
}

pub fn weekly_analysis(days: &[PeriodTotals]) -> WeeklyAnalysis {
    let calories: Vec<i64> = days.iter().map(|d| d.totals.calories).filter(|&c| c != 0).collect();
    let (Some(&min), Some(&max)) = (calories.iter().min(), calories.iter().max()) else {
        return WeeklyAnalysis::InsufficientData;
    };

    let values: Vec<f64> = calories.iter().map(|&c| c as f64).collect();
    let mean = mean(&values);
    let variability = (values.len() >= 3).then(|| {
        let std_dev = sample_std_dev(&values, mean);
        Variability { std_dev, high: std_dev / mean > HIGH_VARIABILITY_RATIO }
    });

    WeeklyAnalysis::Stats(CalorieStats { min, max, mean, spread: max - min, variability })
}

/// Compare the mean calories of the two halves of a date-ordered series.
///
/// The second half gets the extra day of an odd-length series.
pub fn trend_analysis(days: &[PeriodTotals]) -> Option<Trend> {
    if days.len() < 3 {
        return None;
    }
    let calories: Vec<f64> = days.iter().map(|d| d.totals.calories as f64).collect();
    let (first, second) = calories.split_at(calories.len() / 2);
    let (first, second) = (mean(first), mean(second));

    Some(if second > first * RISING_RATIO {
        Trend::Rising
    } else if second < first * FALLING_RATIO {
        Trend::Falling
    } else {
        Trend::Stable
    })
}

/// Hints for average daily intake.
pub fn recommendations(calories: f64, protein_g: f64, fat_g: f64, carbs_g: f64) -> Vec<Recommendation> {
    let mut out = vec![if calories < 1200.0 {
        Recommendation::TooFewCalories
    } else if calories > 3500.0 {
        Recommendation::HighIntake
    } else {
        Recommendation::NormalIntake
    }];

    if protein_g < 50.0 {
        out.push(Recommendation::AddProtein);
    }
    if fat_g < 40.0 {
        out.push(Recommendation::AddFat);
    }
    if carbs_g < 100.0 {
        out.push(Recommendation::AddCarbs);
    }
    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::Nutrients;

    fn days(calories: &[i64]) -> Vec<PeriodTotals> {
        calories
            .iter()
            .enumerate()
            .map(|(i, &c)| PeriodTotals {
                period: format!("2026-03-{:02}", i + 1),
                days: 1,
                totals: Nutrients { calories: c, ..Nutrients::default() },
            })
            .collect()
    }

    #[test]
    fn test_trend_rising() {
        assert_eq!(trend_analysis(&days(&[100, 100, 100, 200, 200, 200, 200])), Some(Trend::Rising));
    }

    #[test]
    fn test_trend_falling_and_stable() {
        assert_eq!(trend_analysis(&days(&[2000, 2000, 1000, 1000])), Some(Trend::Falling));
        assert_eq!(trend_analysis(&days(&[2000, 2100, 1950])), Some(Trend::Stable));
    }

    #[test]
    fn test_trend_needs_three_days() {
        assert_eq!(trend_analysis(&days(&[100, 900])), None);
        assert_eq!(trend_analysis(&[]), None);
    }

    #[test]
    fn test_trend_odd_split_puts_extra_day_second() {
        // First half [1000], second half [1000, 1600]: mean 1300 > 1150.
        assert_eq!(trend_analysis(&days(&[1000, 1000, 1600])), Some(Trend::Rising));
    }

    #[test]
    fn test_weekly_analysis_ignores_zero_days() {
        assert_eq!(weekly_analysis(&days(&[0, 0])), WeeklyAnalysis::InsufficientData);
        assert_eq!(weekly_analysis(&[]), WeeklyAnalysis::InsufficientData);

        let WeeklyAnalysis::Stats(stats) = weekly_analysis(&days(&[0, 1500, 2500])) else {
            panic!("expected stats");
        };
        assert_eq!((stats.min, stats.max, stats.spread), (1500, 2500, 1000));
        assert_eq!(stats.mean, 2000.0);
        assert!(stats.variability.is_none());
    }

    #[test]
    fn test_weekly_analysis_variability() {
        let WeeklyAnalysis::Stats(stable) = weekly_analysis(&days(&[2000, 2100, 1900])) else {
            panic!("expected stats");
        };
        let v = stable.variability.unwrap();
        assert!((v.std_dev - 100.0).abs() < 1e-9);
        assert!(!v.high);

        let WeeklyAnalysis::Stats(erratic) = weekly_analysis(&days(&[500, 3000, 1000])) else {
            panic!("expected stats");
        };
        assert!(erratic.variability.unwrap().high);
    }

    #[test]
    fn test_recommendations() {
        assert_eq!(recommendations(1000.0, 60.0, 50.0, 150.0), vec![Recommendation::TooFewCalories]);
        assert_eq!(recommendations(4000.0, 60.0, 50.0, 150.0), vec![Recommendation::HighIntake]);
        assert_eq!(recommendations(2000.0, 60.0, 50.0, 150.0), vec![Recommendation::NormalIntake]);
        assert_eq!(
            recommendations(1200.0, 49.9, 39.0, 99.0),
            vec![
                Recommendation::NormalIntake,
                Recommendation::AddProtein,
                Recommendation::AddFat,
                Recommendation::AddCarbs
            ]
        );
    }
}
