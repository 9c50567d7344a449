//! Deferred-reconstruction records

use serde_json::{Map, Value as Json};

/// Value of the `kind` field that marks a record
pub const RECORD_KIND: &str = "call";

/// An encoded value rebuilt by calling a registered decoder
///
/// JSON form: `{"args":[..],"kind":"call","kwargs":{..},"target":".."}`, with
/// `args` and `kwargs` omitted when empty. The same shape describes a cached
/// call when a cache key is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredCall {
    pub target: String,
    pub args: Vec<Json>,
    pub kwargs: Map<String, Json>,
}

impl DeferredCall {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Json>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Json>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn to_json(&self) -> Json {
        let mut object = Map::new();
        if !self.args.is_empty() {
            object.insert("args".to_string(), Json::Array(self.args.clone()));
        }
        object.insert("kind".to_string(), Json::String(RECORD_KIND.to_string()));
        if !self.kwargs.is_empty() {
            object.insert("kwargs".to_string(), Json::Object(self.kwargs.clone()));
        }
        object.insert("target".to_string(), Json::String(self.target.clone()));
        Json::Object(object)
    }

    /// Recognize a record; other JSON values yield `None`
    pub fn from_json(json: &Json) -> Option<Self> {
        let object = json.as_object()?;
        if object.get("kind")?.as_str()? != RECORD_KIND {
            return None;
        }
        let target = object.get("target")?.as_str()?.to_string();
        if object
            .keys()
            .any(|k| !matches!(k.as_str(), "kind" | "target" | "args" | "kwargs"))
        {
            return None;
        }
        let args = match object.get("args") {
            Some(Json::Array(args)) => args.clone(),
            Some(_) => return None,
            None => Vec::new(),
        };
        let kwargs = match object.get("kwargs") {
            Some(Json::Object(kwargs)) => kwargs.clone(),
            Some(_) => return None,
            None => Map::new(),
        };
        Some(Self {
            target,
            args,
            kwargs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_parts_are_omitted() {
        let record = DeferredCall::new("mod::f");
        assert_eq!(
            serde_json::to_string(&record.to_json()).unwrap(),
            r#"{"kind":"call","target":"mod::f"}"#
        );
    }

    #[test]
    fn test_keys_are_sorted() {
        let record = DeferredCall::new("mod::f").arg(1).kwarg("z", 2).kwarg("a", 3);
        assert_eq!(
            serde_json::to_string(&record.to_json()).unwrap(),
            r#"{"args":[1],"kind":"call","kwargs":{"a":3,"z":2},"target":"mod::f"}"#
        );
    }

    #[test]
    fn test_plain_maps_are_not_records() {
        assert!(DeferredCall::from_json(&json!({"kind": "call"})).is_none());
        assert!(DeferredCall::from_json(&json!({"kind": "other", "target": "x"})).is_none());
        assert!(
            DeferredCall::from_json(&json!({"kind": "call", "target": "x", "extra": 1})).is_none()
        );
        let parsed = DeferredCall::from_json(&json!({"kind": "call", "target": "x", "args": [1]}));
        assert_eq!(parsed, Some(DeferredCall::new("x").arg(1)));
    }
}
