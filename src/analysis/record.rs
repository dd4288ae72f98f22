//! Loosely-typed upstream records and the field fallback tables used to read them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered list of key spellings for one semantic field.
///
/// The first key holding a present value wins; see [`is_present`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldChain {
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

pub const STATUS: FieldChain = FieldChain {
    field: "status",
    keys: &["status", "result", "state", "execution_status", "executionStatus"],
};

/// End of a run, degrading to start and creation time when never finished.
pub const END_TIME: FieldChain = FieldChain {
    field: "endTime",
    keys: &[
        "end_time",
        "endTime",
        "finished_at",
        "finishedAt",
        "finish_time",
        "finishTime",
        "completed_at",
        "completedAt",
        "completion_time",
        "completionTime",
        "updated_at",
        "updatedAt",
        "start_time",
        "startTime",
        "created_at",
        "createdAt",
    ],
};

pub const START_TIME: FieldChain = FieldChain {
    field: "startTime",
    keys: &[
        "start_time",
        "startTime",
        "begin_time",
        "beginTime",
        "started_at",
        "startedAt",
        "created_at",
        "createdAt",
    ],
};

pub const CREATED_AT: FieldChain = FieldChain {
    field: "createdAt",
    keys: &["created_at", "createdAt", "create_time", "createTime"],
};

pub const PACKAGE_NAMES: FieldChain = FieldChain {
    field: "packageNames",
    keys: &[
        "product_package_names",
        "productPackageNames",
        "package_names",
        "packageNames",
    ],
};

pub const EXECUTOR: FieldChain = FieldChain {
    field: "executor",
    keys: &[
        "executor",
        "executor_name",
        "executorName",
        "executed_by",
        "executedBy",
        "creator",
    ],
};

pub const LABEL: FieldChain = FieldChain {
    field: "label",
    keys: &["process_name", "processName", "name", "task_name", "taskName"],
};

/// Whether a raw value counts as "set" for fallback purposes.
///
/// Null, empty strings, `false` and the number zero are treated as absent.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// One upstream entity as an opaque key/value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// One test run from the automation subsystem.
pub type ExecutionRecord = Record;

/// One test-automation project.
pub type ProjectRecord = Record;

impl Record {
    /// Wrap a JSON value; non-objects become an empty record so they still
    /// count toward totals.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First present value along `chain`.
    pub fn lookup(&self, chain: &FieldChain) -> Option<&Value> {
        chain
            .keys
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| is_present(value))
    }

    /// `lookup` rendered as display text.
    pub fn text(&self, chain: &FieldChain) -> Option<String> {
        self.lookup(chain).and_then(value_text)
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Scalar JSON value as trimmed text.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Convert a page of raw items into records.
pub fn records(items: Vec<Value>) -> Vec<Record> {
    items.into_iter().map(Record::from_value).collect()
}
