//! Rolling helpers shared by the indicator implementations.
//!
//! Inputs are `Option<f64>` so derived series (MACD signal, stochastic %D)
//! can be smoothed with the same code as raw prices. Undefined inputs only
//! ever appear as a leading run.

/// Trailing simple mean. Defined at `i` once the `period` inputs ending at `i`
/// are all defined.
pub fn sma_over(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; input.len()];
    }
    let mut out = Vec::with_capacity(input.len());
    for i in 0..input.len() {
        if i + 1 < period {
            out.push(None);
            continue;
        }
        let window = &input[i + 1 - period..=i];
        let sum: Option<f64> = window.iter().copied().sum();
        out.push(sum.map(|s| s / period as f64));
    }
    out
}

/// Exponential average with `k = 2 / (period + 1)`, seeded by the simple mean
/// of the first `period` defined inputs.
pub fn ema_over(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 {
        return out;
    }
    let Some(first) = input.iter().position(|v| v.is_some()) else {
        return out;
    };
    let seed_idx = first + period - 1;
    if seed_idx >= input.len() {
        return out;
    }

    let seed: Option<f64> = input[first..=seed_idx].iter().copied().sum();
    let Some(seed) = seed else {
        return out;
    };
    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = seed / period as f64;
    out[seed_idx] = Some(prev);

    for i in seed_idx + 1..input.len() {
        if let Some(x) = input[i] {
            prev = (x - prev) * k + prev;
            out[i] = Some(prev);
        }
    }
    out
}

/// Population mean and standard deviation of a window.
pub fn mean_and_stddev(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
