//! Rate-limit window durations
//!
//! Windows are written in configuration files using Go duration syntax
//! (`10s`, `1m30s`, `250ms`) and rendered back in Go's canonical form for the
//! `window` label of the config snapshot metric. Dashboards built against the
//! Caddy module compare these label values literally, so the rendering must
//! match `time.Duration.String()` exactly.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// Largest duration Go can represent (`math.MaxInt64` nanoseconds)
const MAX_NANOS: u128 = i64::MAX as u128;

/// Sliding window length of a rate-limit zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Window(Duration);

impl Window {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for Window {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl FromStr for Window {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        parse_go_duration(s).map(Self)
    }
}

impl TryFrom<String> for Window {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        value.parse()
    }
}

impl From<Window> for String {
    fn from(window: Window) -> Self {
        window.to_string()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_go_duration(self.0))
    }
}

/// Render a duration the way Go's `time.Duration.String()` does
///
/// Durations under one second use the largest fitting sub-second unit
/// (`1.5ms`, `250µs`, `10ns`); longer durations use `h`/`m`/`s` with leading
/// zero units omitted (`10s`, `1m30s`, `1h0m0s`, `2.5s`).
pub fn format_go_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SEC {
        let (unit, scale) = if nanos < NANOS_PER_MICRO {
            ("ns", 1)
        } else if nanos < NANOS_PER_MILLI {
            ("µs", NANOS_PER_MICRO)
        } else {
            ("ms", NANOS_PER_MILLI)
        };
        return format!("{}{}", format_scaled(nanos, scale), unit);
    }

    let hours = nanos / NANOS_PER_HOUR;
    let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
    let seconds = nanos % NANOS_PER_MINUTE;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format_scaled(seconds, NANOS_PER_SEC));
    out.push('s');
    out
}

/// Format `value / scale` as a decimal without trailing fractional zeros
fn format_scaled(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }

    let width = scale.ilog10() as usize;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Parse a Go duration string such as `10s`, `1m30s`, `1.5h` or `300ms`
///
/// Parsing is done by `humantime` after Go-only syntax is rewritten. Negative
/// durations are rejected since a rate-limit window cannot be negative. A bare
/// `0` is accepted, matching Go.
pub fn parse_go_duration(input: &str) -> AppResult<Duration> {
    let invalid = |reason: &str| AppError::InvalidWindow(format!("{:?}: {}", input, reason));

    let rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        return Err(invalid("negative durations are not allowed"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let normalized = to_humantime(rest).map_err(invalid)?;
    let duration = humantime::parse_duration(&normalized).map_err(|e| invalid(&e.to_string()))?;
    if duration.as_nanos() > MAX_NANOS {
        return Err(invalid("duration out of range"));
    }
    Ok(duration)
}

/// Rewrite Go duration syntax into terms `humantime` accepts
///
/// humantime has no fractional components and no `µs` spelling. `1.5s`
/// becomes `1s 500000000ns`; fractional digits beyond nanosecond precision
/// are truncated like Go does.
fn to_humantime(input: &str) -> Result<String, &'static str> {
    let mut terms = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, after_number) = rest.split_at(number_len);
        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, remainder) = after_number.split_at(unit_len);

        let unit = match unit {
            "µs" | "μs" => "us",
            other => other,
        };

        match number.split_once('.') {
            None => terms.push(format!("{}{}", number, unit)),
            Some((whole, frac)) => {
                if frac.contains('.') || (whole.is_empty() && frac.is_empty()) {
                    return Err("malformed number");
                }
                let scale = unit_nanos(unit).ok_or("fractional value needs a known unit")?;
                let whole = if whole.is_empty() { "0" } else { whole };
                terms.push(format!("{}{}", whole, unit));

                let nanos = fraction_nanos(frac, scale);
                if nanos > 0 {
                    terms.push(format!("{}ns", nanos));
                }
            }
        }
        rest = remainder;
    }

    Ok(terms.join(" "))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// Nanoseconds contributed by the digits after the decimal point
///
/// The result is always below `scale`.
fn fraction_nanos(digits: &str, scale: u128) -> u128 {
    let mut nanos = 0;
    let mut divisor: u128 = 1;
    for digit in digits.bytes() {
        divisor *= 10;
        if divisor > scale {
            break;
        }
        nanos += u128::from(digit - b'0') * scale / divisor;
    }
    nanos
}
