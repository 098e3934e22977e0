/// Partial-update payloads
///
/// A PATCH body has to tell three cases apart for each field: not mentioned,
/// set to a value, and (for nullable columns) explicitly cleared. `Field<T>` keeps
/// "absent" separate from everything JSON can express, and `Field<Option<T>>`
/// turns a JSON `null` into `Present(None)`.
///
/// Patches are applied in Rust onto a row loaded `FOR UPDATE`, then written back
/// whole. The same pass records which fields actually changed, which becomes the
/// audit diff.
///
/// # Example
///
/// ```
/// use serde::Deserialize;
/// use warden_shared::models::patch::Field;
///
/// #[derive(Deserialize)]
/// struct ListPatch {
///     #[serde(default)]
///     name: Field<String>,
///     #[serde(default)]
///     description: Field<Option<String>>,
/// }
///
/// let patch: ListPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
/// assert!(patch.name.is_absent());
/// assert_eq!(patch.description, Field::Present(None));
/// ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One field of a partial update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Absent,
    Present(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Field::Absent => Field::Absent,
            Field::Present(value) => Field::Present(value),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Absent => None,
            Field::Present(value) => Some(value),
        }
    }
}

impl<T: PartialEq + Clone + Serialize> Field<T> {
    /// Writes a present value into `target` and reports the change
    ///
    /// Returns `Some({"old": .., "new": ..})` when the stored value changed, `None`
    /// when the field was absent or already equal.
    pub fn apply_to(self, target: &mut T) -> Option<Value> {
        match self {
            Field::Present(value) if *target != value => {
                let change = change_entry(&*target, &value);
                *target = value;
                Some(change)
            }
            _ => None,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Field::Present)
    }
}

fn change_entry<T: Serialize>(old: &T, new: &T) -> Value {
    serde_json::json!({
        "old": serde_json::to_value(old).unwrap_or(Value::Null),
        "new": serde_json::to_value(new).unwrap_or(Value::Null),
    })
}

/// Merges `patch` key-by-key into the JSON object `target`
///
/// A `null` in the patch removes the key. A non-object `target` is replaced by an
/// empty object first. Returns the per-key changes, empty when nothing moved.
pub fn merge_object(target: &mut Value, patch: Map<String, Value>) -> Map<String, Value> {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    let mut changes = Map::new();

    if let Value::Object(existing) = target {
        for (key, value) in patch {
            let old = existing.get(&key).cloned().unwrap_or(Value::Null);
            if old == value {
                continue;
            }

            if value.is_null() {
                existing.remove(&key);
            } else {
                existing.insert(key.clone(), value.clone());
            }

            changes.insert(key, serde_json::json!({ "old": old, "new": value }));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default)]
        title: Field<String>,
        #[serde(default)]
        note: Field<Option<String>>,
    }

    #[test]
    fn test_absent_present_and_null_are_distinct() {
        let empty: Patch = serde_json::from_value(json!({})).unwrap();
        assert!(empty.title.is_absent());
        assert!(empty.note.is_absent());

        let set: Patch = serde_json::from_value(json!({"title": "Q3", "note": "hi"})).unwrap();
        assert_eq!(set.title, Field::Present("Q3".to_string()));
        assert_eq!(set.note, Field::Present(Some("hi".to_string())));

        let cleared: Patch = serde_json::from_value(json!({"note": null})).unwrap();
        assert!(cleared.title.is_absent());
        assert_eq!(cleared.note, Field::Present(None));
    }

    #[test]
    fn test_null_for_non_nullable_field_is_rejected() {
        let result: Result<Patch, _> = serde_json::from_value(json!({"title": null}));
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_reports_only_real_changes() {
        let mut title = "Leads".to_string();

        assert!(Field::Absent.apply_to(&mut title).is_none());
        assert!(Field::Present("Leads".to_string()).apply_to(&mut title).is_none());

        let change = Field::Present("Deals".to_string()).apply_to(&mut title).unwrap();
        assert_eq!(title, "Deals");
        assert_eq!(change, json!({"old": "Leads", "new": "Deals"}));
    }

    #[test]
    fn test_apply_clears_nullable_field() {
        let mut note = Some("draft".to_string());
        let change = Field::Present(None).apply_to(&mut note).unwrap();

        assert_eq!(note, None);
        assert_eq!(change, json!({"old": "draft", "new": null}));
    }

    #[test]
    fn test_merge_object_keeps_untouched_keys() {
        let mut values = json!({"status": "open", "owner": "ada", "score": 3});
        let patch = json!({"status": "won", "score": null, "region": "EU", "owner": "ada"});

        let changes = merge_object(&mut values, patch.as_object().unwrap().clone());

        assert_eq!(values, json!({"status": "won", "owner": "ada", "region": "EU"}));
        assert_eq!(changes.len(), 3);
        assert_eq!(changes["status"], json!({"old": "open", "new": "won"}));
        assert_eq!(changes["score"], json!({"old": 3, "new": null}));
        assert_eq!(changes["region"], json!({"old": null, "new": "EU"}));
    }

    #[test]
    fn test_merge_object_replaces_non_object_target() {
        let mut values = Value::Null;
        merge_object(&mut values, json!({"a": 1}).as_object().unwrap().clone());
        assert_eq!(values, json!({"a": 1}));
    }
}
