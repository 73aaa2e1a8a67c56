//! Non-finite numbers in JSON
//!
//! `serde_json` writes NaN and infinities as `null`. These helpers read such
//! a `null` back as NaN so one bad sample never makes a file unreadable.

use serde::{Deserialize, Deserializer};

pub fn nan_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

pub fn nan_if_null_triple<'de, D>(deserializer: D) -> Result<[f64; 3], D::Error>
where
    D: Deserializer<'de>,
{
    let values = <[Option<f64>; 3]>::deserialize(deserializer)?;
    Ok(values.map(|v| v.unwrap_or(f64::NAN)))
}
