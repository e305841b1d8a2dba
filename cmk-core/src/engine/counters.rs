//! Rate and average counters backed by a value store
//!
//! Both counters keep a `[timestamp, value]` pair under their key.

use serde_json::{json, Value};
use tracing::debug;

use crate::constants::time::SECONDS_PER_MINUTE;
use crate::error::{CheckmkError, Result};
use crate::value_store::ValueStore;

fn read_pair(store: &dyn ValueStore, key: &str) -> Option<(f64, f64)> {
    match store.get(key)? {
        Value::Array(items) if items.len() == 2 => Some((items[0].as_f64()?, items[1].as_f64()?)),
        _ => None,
    }
}

/// Rate of change of `value` per second since the previous call
///
/// The first call (or a call after corrupt state) only stores the pair and
/// returns an `IgnoreResults` error. So does a call without time progress.
/// Negative rates are returned as is.
pub fn get_rate(store: &mut dyn ValueStore, key: &str, now: f64, value: f64) -> Result<f64> {
    let last = read_pair(store, key);
    store.set(key, json!([now, value]));

    let Some((last_time, last_value)) = last else {
        debug!("Initialized counter {}", key);
        return Err(CheckmkError::ignore_results(format!("Initialized: '{}'", key)));
    };

    let elapsed = now - last_time;
    if elapsed <= 0.0 {
        return Err(CheckmkError::ignore_results(format!(
            "No time difference for '{}'",
            key
        )));
    }

    Ok((value - last_value) / elapsed)
}

/// Exponentially weighted average of `value`
///
/// Values older than `backlog_minutes` contribute half of the weight. The
/// first call returns `value` itself.
pub fn get_average(
    store: &mut dyn ValueStore,
    key: &str,
    now: f64,
    value: f64,
    backlog_minutes: f64,
) -> f64 {
    let average = match read_pair(store, key) {
        None => value,
        Some((last_time, last_average)) => {
            let elapsed = (now - last_time).max(0.0);
            let weight_per_minute = 0.5_f64.powf(1.0 / backlog_minutes);
            let weight = weight_per_minute.powf(elapsed / SECONDS_PER_MINUTE);
            last_average * weight + value * (1.0 - weight)
        }
    };
    store.set(key, json!([now, average]));
    average
}
