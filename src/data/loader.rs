use crate::data::candle::{Candle, Indicators};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

//column positions resolved from the csv header
struct Layout {
    required: [usize; 6],
    indicators: Vec<(usize, String)>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut required = [0usize; 6];
        for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow!("CSV header is missing required column '{}'", name))?;
        }

        let indicators = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !required.contains(idx))
            .map(|(idx, name)| (idx, name.trim().to_string()))
            .collect();

        Ok(Layout {
            required,
            indicators,
        })
    }
}

//loads candles from a csv file, every non-ohlcv column becomes an indicator field
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let layout = Layout::from_headers(reader.headers()?)?;
    let mut candles = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = result.context(format!("Failed to parse CSV record at line {}", line))?;
        candles.push(parse_record(&record, &layout, line)?);
    }

    //sort by timestamp to ensure chronological order
    candles.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    tracing::debug!(path = ?path, candles = candles.len(), "loaded candle csv");
    Ok(candles)
}

fn parse_record(record: &StringRecord, layout: &Layout, line: usize) -> Result<Candle> {
    let field = |idx: usize| record.get(idx).unwrap_or("");
    let number = |pos: usize| -> Result<f64> {
        let raw = field(layout.required[pos]);
        raw.parse::<f64>().context(format!(
            "Failed to parse {} '{}' at line {}",
            REQUIRED_COLUMNS[pos], raw, line
        ))
    };

    let raw_ts = field(layout.required[0]);
    let timestamp = parse_timestamp(raw_ts).context(format!(
        "Failed to parse timestamp '{}' at line {}",
        raw_ts, line
    ))?;

    let mut candle = Candle::new(
        timestamp,
        number(1)?,
        number(2)?,
        number(3)?,
        number(4)?,
        number(5)?,
    )
    .context(format!("Invalid candle at line {}", line))?;

    let mut indicators = Indicators::with_capacity(layout.indicators.len());
    for (idx, name) in &layout.indicators {
        let raw = field(*idx);
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            continue;
        }
        let value = raw.parse::<f64>().context(format!(
            "Failed to parse indicator '{}' value '{}' at line {}",
            name, raw, line
        ))?;
        indicators.insert(name.clone(), value);
    }
    candle.indicators = indicators;

    Ok(candle)
}

//accepts rfc3339, naive utc "YYYY-MM-DD HH:MM[:SS]" or epoch milliseconds
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    let millis: i64 = raw
        .parse()
        .map_err(|_| anyhow!("unrecognised timestamp format"))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow!("epoch milliseconds out of range"))
}

//keeps the candles inside (end - days, end], end defaults to the last candle
pub fn slice_horizon(
    candles: &[Candle],
    days: u32,
    end_time: Option<DateTime<Utc>>,
) -> Vec<Candle> {
    let end = match end_time.or_else(|| candles.last().map(|c| c.timestamp)) {
        Some(end) => end,
        None => return Vec::new(),
    };
    let start = end - Duration::days(i64::from(days));

    candles
        .iter()
        .filter(|c| c.timestamp > start && c.timestamp <= end)
        .cloned()
        .collect()
}
