//! Canonical timestamp encoding.
//!
//! One fixed-width UTC encoding (`20240310T100000.123Z`) is used everywhere a
//! record timestamp appears: inside the record document, in the store
//! filename, and in retention cutoff comparisons. Fixed width means lexical
//! order of encoded stamps (and therefore of store filenames) equals
//! chronological order, so the store never needs to parse a document just to
//! sort it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Canonical stamp format: basic ISO-8601 with millisecond precision.
const STAMP_FMT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Record filenames are `log_<stamp>.json`, after the original log naming.
const RECORD_PREFIX: &str = "log_";
const RECORD_SUFFIX: &str = ".json";

/// Truncate a timestamp to the millisecond precision the encoding carries,
/// so a decoded stamp compares equal to the value it was encoded from.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Encode a timestamp in the canonical form.
pub fn encode(ts: DateTime<Utc>) -> String {
    ts.format(STAMP_FMT).to_string()
}

/// Decode a canonical stamp. Returns `None` for anything malformed.
pub fn decode(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, STAMP_FMT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Store filename for a record with the given timestamp.
pub fn record_filename(ts: DateTime<Utc>) -> String {
    format!("{RECORD_PREFIX}{}{RECORD_SUFFIX}", encode(ts))
}

/// Recover the timestamp from a store filename. Returns `None` for files
/// that are not record documents (temp files, strays).
pub fn parse_record_filename(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name
        .strip_prefix(RECORD_PREFIX)?
        .strip_suffix(RECORD_SUFFIX)?;
    decode(stamp)
}

/// Calendar date key for an archive bundle (`2024-03-10`).
pub fn bundle_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Bundle filename for a sweep run at the given instant (`2024-03-10.gz`).
pub fn bundle_filename(ts: DateTime<Utc>) -> String {
    format!("{}.gz", bundle_date(ts))
}

/// Parse a bundle filename back into its calendar date.
pub fn parse_bundle_filename(name: &str) -> Option<NaiveDate> {
    let date = name.strip_suffix(".gz")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Serde bridge so `DiagnosticRecord.timestamp` round-trips through the
/// canonical encoding instead of chrono's default RFC 3339 form.
pub mod stamp_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        super::encode(*ts).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(de)?;
        super::decode(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{s}`")))
    }
}
