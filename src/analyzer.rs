//! Price Analyzer (§4.F): robust-statistics deal detection over a search's
//! recent price history. Grounded on
//! `original_source/backend/app/services/price_analyzer.py`'s median/MAD
//! formulation — the scaled-MAD floor and the two-predicate deal rule are
//! both load-bearing constants, preserved exactly.

const MIN_HISTORY: usize = 10;
const DEAL_THRESHOLD: f64 = -1.5;
const NEW_LOW_MARGIN_PCT: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub is_deal: bool,
    pub traditional_z: Option<f64>,
    pub robust_z: Option<f64>,
    pub percentile: Option<f64>,
    pub is_new_low: bool,
    pub reason: String,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev(values: &[f64], mean_value: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Evaluates `price` against `history` (the last 30-90 days of prices for
/// the same search_definition_id, in any order).
pub fn analyze(price: f64, history: &[f64]) -> AnalysisResult {
    if history.len() < MIN_HISTORY {
        return AnalysisResult {
            is_deal: false,
            traditional_z: None,
            robust_z: None,
            percentile: None,
            is_new_low: false,
            reason: "Insufficient history".to_string(),
        };
    }

    let hist_mean = mean(history);
    let hist_stddev = stddev(history, hist_mean);
    let traditional_z = if hist_stddev > 0.0 { (price - hist_mean) / hist_stddev } else { 0.0 };

    let hist_median = median(history);
    let abs_deviations: Vec<f64> = history.iter().map(|v| (v - hist_median).abs()).collect();
    let mad = median(&abs_deviations);
    let scaled_mad = (1.4826 * mad).max(0.01 * hist_median).max(1.0);
    let robust_z = (price - hist_median) / scaled_mad;

    let worse_or_equal = history.iter().filter(|&&v| v >= price).count();
    let percentile = (worse_or_equal as f64 / history.len() as f64) * 100.0;

    let hist_min = history.iter().cloned().fold(f64::INFINITY, f64::min);
    let is_new_low = price <= hist_min * (1.0 + NEW_LOW_MARGIN_PCT / 100.0);

    let is_deal = robust_z <= DEAL_THRESHOLD || is_new_low;

    let reason = if is_new_low {
        format!("New low: ${price:.2} (prev. min ${hist_min:.2})")
    } else if is_deal {
        let pct_below = ((hist_median - price) / hist_median) * 100.0;
        format!("{pct_below:.0}% below median, {percentile:.0}th percentile")
    } else {
        format!("{percentile:.0}th percentile, not a deal")
    };

    AnalysisResult {
        is_deal,
        traditional_z: Some(traditional_z),
        robust_z: Some(robust_z),
        percentile: Some(percentile),
        is_new_low,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_short_circuits() {
        let result = analyze(500.0, &[100.0, 200.0]);
        assert!(!result.is_deal);
        assert_eq!(result.reason, "Insufficient history");
        assert!(result.robust_z.is_none());
    }

    #[test]
    fn absolute_new_low_flags_as_deal_even_with_mild_z_score() {
        let history: Vec<f64> = (0..15).map(|i| 900.0 + i as f64).collect();
        let result = analyze(899.0, &history);
        assert!(result.is_deal);
        assert!(result.is_new_low);
        assert!(result.reason.starts_with("New low"));
    }

    #[test]
    fn robust_z_below_threshold_flags_as_deal_without_being_a_new_low() {
        let mut history: Vec<f64> = vec![1000.0; 14];
        history.push(100.0);
        let result = analyze(700.0, &history);
        assert!(!result.is_new_low);
        assert!(result.robust_z.unwrap() <= DEAL_THRESHOLD);
        assert!(result.is_deal);
    }

    #[test]
    fn unremarkable_price_is_not_a_deal() {
        let history: Vec<f64> = (0..20).map(|i| 800.0 + (i as f64 * 2.0)).collect();
        let result = analyze(820.0, &history);
        assert!(!result.is_deal);
        assert!(result.reason.contains("not a deal"));
    }

    #[test]
    fn scaled_mad_floor_prevents_division_by_zero_on_constant_history() {
        let history = vec![500.0; 12];
        let result = analyze(495.0, &history);
        assert!(result.robust_z.unwrap().is_finite());
    }
}
