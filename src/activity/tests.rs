use super::*;
use serde_json::json;

fn activity(id: i64) -> Activity {
    serde_json::from_value(json!({ "id": id })).unwrap()
}

fn page(records: Value) -> ActivityPage {
    serde_json::from_value(json!({ "activities": records })).unwrap()
}

#[test]
fn test_deserialize_full_activity() {
    let raw = json!({
        "id": 101,
        "activityTime": 1707668400.25,
        "deviceId": 42,
        "severity": "MAJOR",
        "priority": "HIGH",
        "seriesUid": "4f0c",
        "activityType": "CONDITION",
        "statusCode": "TRIGGERED",
        "status": "Disk space low",
        "activityResult": "SUCCESS",
        "sourceConfigUid": "c1",
        "sourceName": "Disk Monitor",
        "subject": "C: below 10%",
        "userId": 7,
        "message": "Free space 8%",
        "type": "ACTION",
        "data": {"message": {"code": "disk"}}
    });

    let activity: Activity = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(activity.id, 101);
    assert_eq!(activity.fields.get("deviceId"), Some(&json!(42)));
    assert_eq!(activity.fields.get("type"), Some(&json!("ACTION")));
    assert!(activity.fields.get("id").is_none());
    assert_eq!(serde_json::to_value(&activity).unwrap(), raw);
}

#[test]
fn test_odd_typed_fields_pass_through() {
    let raw = json!({
        "id": 104,
        "userId": "system",
        "deviceId": null,
        "severity": 3,
        "activityTime": "yesterday",
        "tags": ["a", "b"]
    });

    let activity: Activity = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(activity.fields.get("userId"), Some(&json!("system")));
    assert_eq!(serde_json::to_value(&activity).unwrap(), raw);
}

#[test]
fn test_null_fields_are_kept() {
    let raw = json!({"id": 7, "message": "m", "severity": null});

    let activity: Activity = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(activity.fields.get("severity"), Some(&Value::Null));
    assert_eq!(serde_json::to_value(&activity).unwrap(), raw);
}

#[test]
fn test_integer_timestamps_are_not_reencoded() {
    let raw = json!({"id": 5, "activityTime": 1707668400});
    let activity: Activity = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(serde_json::to_value(&activity).unwrap(), raw);
}

#[test]
fn test_page_sorts_ascending_and_keeps_duplicates() {
    let ids: Vec<i64> = page(json!([{"id": 5}, {"id": 2}, {"id": 9}, {"id": 2}]))
        .into_sorted()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![2, 2, 5, 9]);
}

#[test]
fn test_page_skips_records_without_usable_id() {
    let records = page(json!([
        {"id": 103, "severity": "MINOR"},
        {"id": "x"},
        {"message": "no id"},
        "not an object",
        {"id": 104, "userId": "system"}
    ]))
    .into_sorted();

    let ids: Vec<i64> = records.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![103, 104]);
}

#[test]
fn test_page_missing_fields_default() {
    let page: ActivityPage = serde_json::from_str("{}").unwrap();
    assert!(page.last_activity_id.is_none());
    assert!(page.activities.is_empty());
}

#[test]
fn test_max_id() {
    assert_eq!(max_id(&[]), None);
    assert_eq!(max_id(&[activity(3), activity(11), activity(7)]), Some(11));
}
