use crate::domain::analysis::TechnicalFrame;
use crate::domain::market::PriceBar;

const RSI_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const BOLL_PERIOD: usize = 20;
const BOLL_WIDTH: f64 = 2.0;

/// Builds the indicator frame from daily bars, oldest first.
pub fn compute_frame(bars: &[PriceBar]) -> TechnicalFrame {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let ema12 = calc_ema(&closes, 12);
    let ema26 = calc_ema(&closes, 26);
    let (macd, macd_signal, macd_hist) = calc_macd(&ema12, &ema26, 9);
    let (boll_upper, boll_middle, boll_lower) = calc_boll(&closes, BOLL_PERIOD, BOLL_WIDTH);

    TechnicalFrame {
        dates: bars.iter().map(|b| b.date).collect(),
        sma20: calc_sma(&closes, 20),
        sma50: calc_sma(&closes, 50),
        ema12,
        ema26,
        macd,
        macd_signal,
        macd_hist,
        rsi14: calc_rsi(&closes, RSI_PERIOD),
        boll_upper,
        boll_middle,
        boll_lower,
        atr14: calc_atr(&highs, &lows, &closes, ATR_PERIOD),
        obv: calc_obv(&closes, &volumes),
        close: closes,
    }
}

/// One-paragraph reading of the latest row for the LLM findings text.
pub fn summarize(frame: &TechnicalFrame) -> String {
    let Some(i) = frame.len().checked_sub(1) else {
        return "No price history.".to_string();
    };

    let mut parts = vec![format!("Last close {:.2} on {}", frame.close[i], frame.dates[i])];

    match (frame.sma20[i], frame.sma50[i]) {
        (Some(s20), Some(s50)) if s20 > s50 => {
            parts.push(format!("SMA20 {s20:.2} above SMA50 {s50:.2} (uptrend)"))
        }
        (Some(s20), Some(s50)) => {
            parts.push(format!("SMA20 {s20:.2} below SMA50 {s50:.2} (downtrend)"))
        }
        (Some(s20), None) => parts.push(format!("SMA20 {s20:.2}")),
        _ => {}
    }

    if let Some(rsi) = frame.rsi14[i] {
        let zone = if rsi >= 70.0 {
            "overbought"
        } else if rsi <= 30.0 {
            "oversold"
        } else {
            "neutral"
        };
        parts.push(format!("RSI14 {rsi:.1} ({zone})"));
    }

    if let (Some(m), Some(s)) = (frame.macd[i], frame.macd_signal[i]) {
        let side = if m >= s { "above" } else { "below" };
        parts.push(format!("MACD {m:.3} {side} signal {s:.3}"));
    }

    if let (Some(up), Some(low)) = (frame.boll_upper[i], frame.boll_lower[i]) {
        let close = frame.close[i];
        if close > up {
            parts.push("close above upper Bollinger band".to_string());
        } else if close < low {
            parts.push("close below lower Bollinger band".to_string());
        } else {
            parts.push(format!("Bollinger band {low:.2}-{up:.2}"));
        }
    }

    if let Some(atr) = frame.atr14[i] {
        parts.push(format!("ATR14 {atr:.2}"));
    }

    if i >= 20 {
        let direction = if frame.obv[i] >= frame.obv[i - 20] {
            "rising"
        } else {
            "falling"
        };
        parts.push(format!("OBV {direction} over 20 sessions"));
    }

    parts.join("; ") + "."
}

fn calc_sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let mut sum: f64 = data[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);

    for i in period..data.len() {
        sum += data[i] - data[i - period];
        result[i] = Some(sum / period as f64);
    }
    result
}

/// EMA seeded with the SMA of the first `period` values.
fn calc_ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(prev);

    for i in period..data.len() {
        prev = data[i] * k + prev * (1.0 - k);
        result[i] = Some(prev);
    }
    result
}

fn calc_macd(
    fast: &[Option<f64>],
    slow: &[Option<f64>],
    signal: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = fast.len();
    let macd: Vec<Option<f64>> = fast
        .iter()
        .zip(slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let mut signal_line = vec![None; n];
    let mut hist = vec![None; n];

    if let Some(start) = macd.iter().position(Option::is_some) {
        let values: Vec<f64> = macd[start..].iter().map(|v| v.unwrap_or_default()).collect();
        for (offset, value) in calc_ema(&values, signal).into_iter().enumerate() {
            let i = start + offset;
            signal_line[i] = value;
            if let (Some(m), Some(s)) = (macd[i], value) {
                hist[i] = Some(m - s);
            }
        }
    }

    (macd, signal_line, hist)
}

/// Wilder-smoothed RSI; always within `[0, 100]`.
fn calc_rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let rsi = |gain: f64, loss: f64| {
        if loss.abs() < 1e-10 {
            if gain.abs() < 1e-10 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        }
    };

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = Some(rsi(avg_gain, avg_loss));

    let p = period as f64;
    for i in (period + 1)..data.len() {
        let change = data[i] - data[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        result[i] = Some(rsi(avg_gain, avg_loss));
    }

    result
}

fn calc_boll(
    data: &[f64],
    period: usize,
    width: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = data.len();
    let mut upper = vec![None; n];
    let mut middle = vec![None; n];
    let mut lower = vec![None; n];
    if period == 0 || n < period {
        return (upper, middle, lower);
    }

    for i in (period - 1)..n {
        let slice = &data[i + 1 - period..=i];
        let mean = slice.iter().sum::<f64>() / period as f64;
        let var = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let sd = var.sqrt();
        upper[i] = Some(mean + width * sd);
        middle[i] = Some(mean);
        lower[i] = Some(mean - width * sd);
    }

    (upper, middle, lower)
}

fn calc_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n < period + 1 {
        return result;
    }

    let true_range: Vec<f64> = (0..n)
        .map(|i| {
            let hl = highs[i] - lows[i];
            if i == 0 {
                return hl;
            }
            let prev = closes[i - 1];
            hl.max((highs[i] - prev).abs()).max((lows[i] - prev).abs())
        })
        .collect();

    let p = period as f64;
    let mut atr = true_range[1..=period].iter().sum::<f64>() / p;
    result[period] = Some(atr);
    for i in (period + 1)..n {
        atr = (atr * (p - 1.0) + true_range[i]) / p;
        result[i] = Some(atr);
    }
    result
}

fn calc_obv(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(closes.len());
    let mut obv = 0.0;
    for i in 0..closes.len() {
        if i > 0 {
            if closes[i] > closes[i - 1] {
                obv += volumes[i];
            } else if closes[i] < closes[i - 1] {
                obv -= volumes[i];
            }
        }
        result.push(obv);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PriceBar {
                date: start + chrono::Days::new(i as u64),
                open: *c,
                high: c + 1.0,
                low: c - 1.0,
                close: *c,
                volume: 1_000.0,
            })
            .collect()
    }

    #[test]
    fn sma_matches_hand_computation() {
        let sma = calc_sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(sma, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn ema_is_seeded_with_sma() {
        let ema = calc_ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(ema[1], None);
        assert_eq!(ema[2], Some(4.0));
        // k = 0.5
        assert_eq!(ema[3], Some(6.0));
    }

    #[test]
    fn rsi_stays_in_bounds() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 50.0 + ((i as f64) * 0.7).sin() * 10.0 + (i % 7) as f64)
            .collect();
        for v in calc_rsi(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "rsi out of range: {v}");
        }

        let rising: Vec<f64> = (0..30).map(|i| i as f64).collect();
        assert_eq!(calc_rsi(&rising, 14)[29], Some(100.0));
        let flat = vec![10.0; 30];
        assert_eq!(calc_rsi(&flat, 14)[29], Some(50.0));
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let obv = calc_obv(&[1.0, 2.0, 2.0, 1.0], &[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(obv, vec![0.0, 20.0, 20.0, -20.0]);
    }

    #[test]
    fn frame_columns_align_with_dates() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + i as f64 * 0.5).collect();
        let frame = compute_frame(&bars(&closes));
        assert_eq!(frame.len(), 60);
        for col in [&frame.sma20, &frame.sma50, &frame.macd, &frame.rsi14, &frame.atr14] {
            assert_eq!(col.len(), 60);
        }
        assert!(frame.sma50[48].is_none());
        assert!(frame.sma50[49].is_some());
        assert!(frame.macd_signal[33].is_some());
        assert!(frame.macd_signal[32].is_none());
        // Constant high-low spread of 2 with steps of 0.5.
        assert!((frame.atr14[59].unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn summary_reads_latest_row() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + i as f64).collect();
        let text = summarize(&compute_frame(&bars(&closes)));
        assert!(text.starts_with("Last close 69.00"));
        assert!(text.contains("uptrend"));
        assert!(text.contains("overbought"));
        assert!(text.contains("OBV rising"));

        assert_eq!(summarize(&TechnicalFrame::default()), "No price history.");
    }
}
