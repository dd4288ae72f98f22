//! Tolerant decoding of list-endpoint response envelopes.
//!
//! The backend is inconsistent about where it puts items and pagination
//! metadata, so every lookup walks an ordered list of candidate locations.

use serde_json::{Map, Value};

/// Field names that commonly wrap an item array when `data` is an object.
const ITEM_FIELDS: &[&str] = &["items", "results", "records", "list", "rows"];

const CURRENT_PAGE_KEYS: &[&str] = &["page", "current_page", "currentPage"];
const TOTAL_PAGES_KEYS: &[&str] = &["total_pages", "totalPages", "pages"];
const TOTAL_COUNT_KEYS: &[&str] = &["total_count", "totalCount", "total"];

/// Pagination metadata, whichever shape it arrived in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: Option<u64>,
    pub total_pages: Option<u64>,
    pub total_count: Option<u64>,
}

/// One decoded page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub meta: PageMeta,
}

/// Decode a page body. `Err` carries a human-readable reason.
pub fn parse_page(body: Value, items_field: Option<&str>) -> Result<Page, String> {
    let Value::Object(mut body) = body else {
        return Err("response body is not a JSON object".to_string());
    };

    match body.get("success") {
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => return Err("success flag is false".to_string()),
        Some(_) => return Err("success flag is not a boolean".to_string()),
        None => return Err("missing success flag".to_string()),
    }

    let data = body.remove("data");
    let meta = extract_meta(&body, data.as_ref());

    let items = match data {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut obj)) => take_items(&mut obj, items_field)
            .ok_or_else(|| "data object carries no item array".to_string())?,
        Some(Value::Null) | None => match items_field.and_then(|f| body.remove(f)) {
            Some(Value::Array(items)) => items,
            _ => return Err("missing data payload".to_string()),
        },
        Some(_) => return Err("data payload is neither array nor object".to_string()),
    };

    Ok(Page { items, meta })
}

fn take_items(obj: &mut Map<String, Value>, items_field: Option<&str>) -> Option<Vec<Value>> {
    let named = items_field.into_iter().chain(ITEM_FIELDS.iter().copied());
    for key in named {
        if matches!(obj.get(key), Some(Value::Array(_))) {
            if let Some(Value::Array(items)) = obj.remove(key) {
                return Some(items);
            }
        }
    }

    // Last resort: the only array-valued field.
    let arrays: Vec<String> = obj
        .iter()
        .filter(|(_, v)| v.is_array())
        .map(|(k, _)| k.clone())
        .collect();
    let [only] = arrays.as_slice() else {
        return None;
    };
    match obj.remove(only.as_str()) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn extract_meta(body: &Map<String, Value>, data: Option<&Value>) -> PageMeta {
    let data_obj = data.and_then(Value::as_object);

    // Most specific location first.
    let mut sources: Vec<&Map<String, Value>> = Vec::with_capacity(4);
    if let Some(p) = body.get("pagination").and_then(Value::as_object) {
        sources.push(p);
    }
    if let Some(obj) = data_obj {
        if let Some(p) = obj.get("pagination").and_then(Value::as_object) {
            sources.push(p);
        }
        sources.push(obj);
    }
    sources.push(body);

    PageMeta {
        current_page: first_number(&sources, CURRENT_PAGE_KEYS),
        total_pages: first_number(&sources, TOTAL_PAGES_KEYS),
        total_count: first_number(&sources, TOTAL_COUNT_KEYS),
    }
}

fn first_number(sources: &[&Map<String, Value>], keys: &[&str]) -> Option<u64> {
    sources
        .iter()
        .flat_map(|src| keys.iter().filter_map(move |k| src.get(*k)))
        .find_map(as_count)
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array_data() {
        let page = parse_page(json!({"success": true, "data": [1, 2, 3]}), None).unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.meta, PageMeta::default());
    }

    #[test]
    fn test_named_field_with_nested_pagination() {
        let body = json!({
            "success": true,
            "data": {
                "executions": [{"id": 1}, {"id": 2}],
                "pagination": {"page": 2, "total_pages": 5, "total_count": 42}
            }
        });
        let page = parse_page(body, Some("executions")).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.meta.current_page, Some(2));
        assert_eq!(page.meta.total_pages, Some(5));
        assert_eq!(page.meta.total_count, Some(42));
    }

    #[test]
    fn test_camel_case_metadata_at_top_level() {
        let body = json!({
            "success": true,
            "data": {"items": [{"id": 1}]},
            "currentPage": 1,
            "totalPages": "3",
            "totalCount": 7
        });
        let page = parse_page(body, None).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.meta.total_pages, Some(3));
        assert_eq!(page.meta.total_count, Some(7));
    }

    #[test]
    fn test_pages_alias_inside_data() {
        let body = json!({
            "success": true,
            "data": {"projects": [], "pages": 4, "total": 380}
        });
        let page = parse_page(body, Some("projects")).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.meta.total_pages, Some(4));
        assert_eq!(page.meta.total_count, Some(380));
    }

    #[test]
    fn test_unknown_field_name_single_array() {
        let body = json!({"success": true, "data": {"whatever": [{"id": 9}], "count": 1}});
        let page = parse_page(body, Some("executions")).unwrap();
        assert_eq!(page.items, vec![json!({"id": 9})]);
    }

    #[test]
    fn test_missing_success_flag_is_malformed() {
        let err = parse_page(json!({"data": []}), None).unwrap_err();
        assert!(err.contains("success"));

        let err = parse_page(json!({"success": false, "data": []}), None).unwrap_err();
        assert!(err.contains("false"));
    }

    #[test]
    fn test_non_object_body_is_malformed() {
        assert!(parse_page(json!([1, 2]), None).is_err());
        assert!(parse_page(json!({"success": true, "data": "nope"}), None).is_err());
        assert!(parse_page(json!({"success": true}), None).is_err());
    }
}
