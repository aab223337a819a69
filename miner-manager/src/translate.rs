//! Translation of a device status document into a line-protocol record.

use miner_manager_common::{FieldValue, Record};
use serde_json::Value;

use crate::difficulty::parse_difficulty;
use crate::status::RawStatus;

/// Measurement name of every emitted record.
pub const MEASUREMENT: &str = "miner_device_stats";

/// Keys copied into tags, in emission order.
pub const TAG_KEYS: &[&str] = &["hostname", "macAddr", "version", "ASICModel"];

/// Keys copied into fields when they hold a number, in emission order.
pub const FIELD_KEYS: &[&str] = &[
    "power",
    "voltage",
    "current",
    "temp",
    "temp2",
    "vrTemp",
    "hashRate",
    "hashRate_1m",
    "hashRate_10m",
    "expectedHashrate",
    "coreVoltageActual",
    "sharesAccepted",
    "sharesRejected",
    "wifiRSSI",
    "fanspeed",
    "fanrpm",
    "uptimeSeconds",
    "freeHeap",
    "frequency",
];

/// Difficulty strings and the float fields they become.
pub const DIFFICULTY_KEYS: &[(&str, &str)] = &[
    ("bestDiff", "bestDifficulty"),
    ("bestSessionDiff", "bestSessionDifficulty"),
];

const REJECT_REASONS_KEY: &str = "sharesRejectedReasons";
const STALE_MESSAGE: &str = "Stale";
const STALE_FIELD: &str = "sharesStale";

/// Insertion-ordered field list. Setting an existing name overwrites the
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    /// Insert or overwrite `name`.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn into_vec(self) -> Vec<(String, FieldValue)> {
        self.0
    }

    /// Value stored for `name`.
    #[cfg(test)]
    fn get(&self, name: &str) -> Option<FieldValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }

    /// Field names in order.
    #[cfg(test)]
    fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(k, _)| k.as_str()).collect()
    }
}

/// Select the allow-listed tags that carry a value.
pub fn extract_tags(status: &RawStatus) -> Vec<(String, String)> {
    TAG_KEYS
        .iter()
        .filter_map(|key| status.get_tag(key).map(|value| (key.to_string(), value)))
        .collect()
}

/// Collect numeric fields, parsed difficulties and the stale-share count.
pub fn collect_fields(status: &RawStatus) -> Fields {
    let mut fields = Fields::default();

    for key in FIELD_KEYS {
        if let Some(value) = status.get_number(key) {
            fields.set(key, value);
        }
    }

    for (source, name) in DIFFICULTY_KEYS {
        // Zero means "no share found yet" and is left out like a missing value.
        let parsed = status
            .get(source)
            .and_then(parse_difficulty)
            .filter(|d| *d != 0.0 && d.is_finite());
        if let Some(difficulty) = parsed {
            fields.set(name, FieldValue::Float(difficulty));
        }
    }

    if let Some(count) = stale_share_count(status) {
        fields.set(STALE_FIELD, FieldValue::Integer(count));
    }

    fields
}

/// Count from the last `{"message": "Stale", "count": <int>}` entry of the
/// rejected-share reasons. Malformed entries are skipped.
pub fn stale_share_count(status: &RawStatus) -> Option<i64> {
    status
        .get_list(REJECT_REASONS_KEY)?
        .iter()
        .filter_map(|entry| {
            let entry = entry.as_object()?;
            if entry.get("message").and_then(Value::as_str) != Some(STALE_MESSAGE) {
                return None;
            }
            entry.get("count").and_then(Value::as_i64)
        })
        .last()
}

/// Build the record for one device, or `None` when it reported no fields.
pub fn translate(status: &RawStatus, timestamp_ns: u64) -> Option<Record> {
    let fields = collect_fields(status);

    Record::new(
        MEASUREMENT,
        extract_tags(status),
        fields.into_vec(),
        timestamp_ns,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(value: Value) -> RawStatus {
        RawStatus::from_value(value).unwrap()
    }

    #[test]
    fn test_end_to_end_example() {
        let s = status(json!({
            "hostname": "bm1",
            "bestDiff": "3.49G",
            "hashRate": 450.2,
            "sharesRejectedReasons": [{"message": "Stale", "count": 3}],
        }));

        let record = translate(&s, 1_700_000_000_000_000_000).unwrap();

        assert_eq!(
            record.to_line(),
            "miner_device_stats,hostname=bm1 \
             hashRate=450.2,bestDifficulty=3490000000.0,sharesStale=3i \
             1700000000000000000"
        );
    }

    #[test]
    fn test_tags_in_allow_list_order() {
        let s = status(json!({
            "ASICModel": "BM1366",
            "version": "v2.1.0",
            "macAddr": "AA:BB:CC:DD:EE:FF",
            "hostname": "bitaxe",
            "ssid": "home",
        }));

        let tags = extract_tags(&s);
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(keys, vec!["hostname", "macAddr", "version", "ASICModel"]);
    }

    #[test]
    fn test_true_tag_kept() {
        let s = status(json!({
            "hostname": "bitaxe",
            "version": true,
            "ASICModel": false,
            "power": 5,
        }));

        assert_eq!(
            translate(&s, 1).unwrap().to_line(),
            "miner_device_stats,hostname=bitaxe,version=True power=5i 1"
        );
    }

    #[test]
    fn test_falsy_tags_skipped() {
        let s = status(json!({
            "hostname": "",
            "macAddr": null,
            "version": "2.0",
        }));

        assert_eq!(
            extract_tags(&s),
            vec![("version".to_string(), "2.0".to_string())]
        );
    }

    #[test]
    fn test_tag_values_escaped_in_record() {
        let s = status(json!({
            "hostname": "rack 1,shelf=2",
            "power": 10,
        }));

        let line = translate(&s, 0).unwrap().to_line();

        assert!(line.starts_with("miner_device_stats,hostname=rack\\ 1\\,shelf\\=2 power=10i"));
    }

    #[test]
    fn test_direct_fields_type_filter() {
        let s = status(json!({
            "power": 14.2,
            "voltage": "5.1",
            "current": true,
            "temp": null,
            "temp2": [40],
            "fanrpm": 3500,
        }));

        let fields = collect_fields(&s);

        assert_eq!(fields.names(), vec!["power", "fanrpm"]);
        assert_eq!(fields.get("power"), Some(FieldValue::Float(14.2)));
        assert_eq!(fields.get("fanrpm"), Some(FieldValue::Integer(3500)));
    }

    #[test]
    fn test_field_order_follows_allow_list() {
        let s = status(json!({
            "frequency": 525,
            "power": 12.0,
            "hashRate": 500.1,
            "bestSessionDiff": "10K",
            "bestDiff": "1M",
        }));

        assert_eq!(
            collect_fields(&s).names(),
            vec![
                "power",
                "hashRate",
                "frequency",
                "bestDifficulty",
                "bestSessionDifficulty",
            ]
        );
    }

    #[test]
    fn test_all_direct_fields_recognized() {
        let mut doc = serde_json::Map::new();
        for key in FIELD_KEYS {
            doc.insert(key.to_string(), json!(1));
        }

        assert_eq!(collect_fields(&RawStatus::new(doc)).len(), FIELD_KEYS.len());
    }

    #[test]
    fn test_difficulty_omitted_when_zero_or_invalid() {
        let s = status(json!({
            "bestDiff": "0",
            "bestSessionDiff": "n/a",
            "power": 1.5,
        }));

        assert_eq!(collect_fields(&s).names(), vec!["power"]);

        let s = status(json!({ "bestDiff": 1234, "power": 1.5 }));
        assert_eq!(collect_fields(&s).get("bestDifficulty"), None);
    }

    #[test]
    fn test_difficulty_is_float() {
        let s = status(json!({ "bestSessionDiff": "250k" }));

        assert_eq!(
            collect_fields(&s).get("bestSessionDifficulty"),
            Some(FieldValue::Float(250_000.0))
        );
    }

    #[test]
    fn test_stale_count_last_wins() {
        let s = status(json!({
            "sharesRejectedReasons": [
                {"message": "Stale", "count": 4},
                {"message": "Above target", "count": 9},
                {"message": "Stale", "count": 7},
            ],
        }));

        assert_eq!(stale_share_count(&s), Some(7));
        assert_eq!(
            collect_fields(&s).get("sharesStale"),
            Some(FieldValue::Integer(7))
        );
    }

    #[test]
    fn test_stale_count_skips_malformed_entries() {
        let s = status(json!({
            "sharesRejectedReasons": [
                {"message": "Stale", "count": 2},
                "Stale",
                {"message": "Stale", "count": "5"},
                {"message": "Stale", "count": 1.5},
                {"message": "stale", "count": 8},
                {"count": 6},
            ],
        }));

        assert_eq!(stale_share_count(&s), Some(2));
    }

    #[test]
    fn test_stale_count_requires_list() {
        let s = status(json!({
            "sharesRejectedReasons": {"message": "Stale", "count": 2},
        }));
        assert_eq!(stale_share_count(&s), None);

        let s = status(json!({ "sharesRejectedReasons": [] }));
        assert_eq!(stale_share_count(&s), None);
    }

    #[test]
    fn test_no_fields_suppresses_record() {
        let s = status(json!({
            "hostname": "bitaxe",
            "version": "2.0",
            "bestDiff": "0",
            "temp": "hot",
        }));

        assert!(translate(&s, 1).is_none());
        assert!(translate(&RawStatus::default(), 1).is_none());
    }

    #[test]
    fn test_record_without_tags() {
        let s = status(json!({ "sharesAccepted": 12 }));

        assert_eq!(
            translate(&s, 9).unwrap().to_line(),
            "miner_device_stats sharesAccepted=12i 9"
        );
    }

    #[test]
    fn test_fields_set_overwrites_in_place() {
        let mut fields = Fields::default();
        fields.set("a", FieldValue::Integer(1));
        fields.set("b", FieldValue::Integer(2));
        fields.set("a", FieldValue::Integer(3));

        assert_eq!(fields.names(), vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(FieldValue::Integer(3)));
    }
}
