use ips_core::{CompositionSection, IpsDocument, ResourceEnvelope};
use serde_json::Value;

use crate::event::{Key, Parent, ValueEvent, ValueSink};

/// Folds value events into an [`IpsDocument`].
///
/// Resources of top-level entries are moved out of the tree as soon as they are recognised and
/// completed entries are dropped, so the parser never holds more than the entry currently being
/// read. Envelopes nested deeper inside a resource are copied and left in place, so the enclosing
/// resource keeps its payload unchanged.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: IpsDocument,
    root_type: Option<String>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> &IpsDocument {
        &self.document
    }

    /// `resourceType` of the root object, once seen.
    pub fn root_type(&self) -> Option<&str> {
        self.root_type.as_deref()
    }

    pub fn into_document(self) -> IpsDocument {
        if self.root_type.as_deref() != Some("Bundle") {
            tracing::warn!(
                root_type = self.root_type.as_deref().unwrap_or("<missing>"),
                "document root is not a FHIR Bundle"
            );
        }
        self.document
    }

    /// Apply one event. Returns the value when it should stay attached to its parent.
    pub fn apply(&mut self, event: ValueEvent<'_>) -> Option<Value> {
        let ValueEvent {
            path,
            key,
            parent,
            value,
        } = event;

        match key {
            Key::Field(name) if name == "resource" && value.is_object() => {
                self.accept_resource(path, parent, value)
            }
            Key::Index(_) if is_bundle_entry(path, &parent) => {
                self.finish_entry(value);
                None
            }
            Key::Field(name) if path.is_empty() && matches!(parent, Parent::Object(_)) => {
                self.record_bundle_field(name, &value);
                Some(value)
            }
            _ => Some(value),
        }
    }

    fn accept_resource(
        &mut self,
        path: &[Key],
        parent: Parent<'_>,
        resource: Value,
    ) -> Option<Value> {
        let detach = is_top_level_entry(path);

        if is_composition(&resource) {
            if detach {
                self.capture_composition(resource);
                return None;
            }
            self.capture_composition(resource.clone());
            return Some(resource);
        }

        let Some(full_url) = parent.field_str("fullUrl").map(str::to_string) else {
            return Some(resource);
        };
        if detach {
            self.push_envelope(full_url, resource);
            None
        } else {
            self.push_envelope(full_url, resource.clone());
            Some(resource)
        }
    }

    /// A top-level entry completed. A resource still attached here arrived before its `fullUrl`.
    fn finish_entry(&mut self, entry: Value) {
        let Value::Object(mut entry) = entry else {
            return;
        };
        let Some(resource) = entry.remove("resource").filter(Value::is_object) else {
            return;
        };
        match entry.get("fullUrl").and_then(Value::as_str) {
            Some(full_url) => {
                tracing::debug!(full_url, "entry listed resource before fullUrl");
                self.push_envelope(full_url.to_string(), resource);
            }
            None => tracing::debug!("skipping bundle entry without fullUrl"),
        }
    }

    fn push_envelope(&mut self, full_url: String, resource: Value) {
        self.document
            .resources
            .push(ResourceEnvelope::new(full_url, resource));
    }

    fn capture_composition(&mut self, composition: Value) {
        if self.document.composition.is_some() {
            tracing::warn!("bundle contains more than one Composition; keeping the last one");
        }

        let sections = composition
            .get("section")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        serde_json::from_value::<CompositionSection>(item.clone())
                            .map_err(|err| {
                                tracing::warn!(index, %err, "skipping undecodable Composition section")
                            })
                            .ok()
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.document.sections = sections;
        self.document.composition = Some(composition);
    }

    fn record_bundle_field(&mut self, name: &str, value: &Value) {
        let Some(text) = value.as_str() else {
            return;
        };
        match name {
            "resourceType" => self.root_type = Some(text.to_string()),
            "id" => self.document.bundle_id = Some(text.to_string()),
            "type" => self.document.bundle_type = Some(text.to_string()),
            "timestamp" => self.document.timestamp = Some(text.to_string()),
            _ => {}
        }
    }
}

impl ValueSink for DocumentBuilder {
    fn on_value(&mut self, event: ValueEvent<'_>) -> Option<Value> {
        self.apply(event)
    }
}

fn is_composition(resource: &Value) -> bool {
    resource.get("resourceType").and_then(Value::as_str) == Some("Composition")
        && resource.get("section").is_some_and(Value::is_array)
}

fn is_top_level_entry(path: &[Key]) -> bool {
    matches!(path, [Key::Field(name), Key::Index(_)] if name == "entry")
}

fn is_bundle_entry(path: &[Key], parent: &Parent<'_>) -> bool {
    matches!(parent, Parent::Array(_)) && matches!(path, [Key::Field(name)] if name == "entry")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn entry_path() -> Vec<Key> {
        vec![Key::Field("entry".into()), Key::Index(0)]
    }

    #[test]
    fn resource_with_full_url_sibling_is_captured() {
        let mut builder = DocumentBuilder::new();
        let parent = object(json!({"fullUrl": "urn:uuid:1"}));
        let key = Key::Field("resource".into());
        let path = entry_path();

        let kept = builder.apply(ValueEvent {
            path: &path,
            key: &key,
            parent: Parent::Object(&parent),
            value: json!({"resourceType": "Condition", "id": "c1"}),
        });

        assert!(kept.is_none());
        let doc = builder.document();
        assert_eq!(doc.resources.len(), 1);
        assert_eq!(doc.resources[0].full_url, "urn:uuid:1");
        assert_eq!(doc.resources[0].resource["id"], "c1");
    }

    #[test]
    fn nested_envelope_is_copied_and_stays_attached() {
        let mut builder = DocumentBuilder::new();
        let parent = object(json!({"fullUrl": "urn:uuid:inner"}));
        let key = Key::Field("resource".into());
        let path = vec![
            Key::Field("entry".into()),
            Key::Index(0),
            Key::Field("resource".into()),
            Key::Field("entry".into()),
            Key::Index(0),
        ];
        let value = json!({"resourceType": "Patient", "id": "p1"});

        let kept = builder.apply(ValueEvent {
            path: &path,
            key: &key,
            parent: Parent::Object(&parent),
            value: value.clone(),
        });

        assert_eq!(kept, Some(value.clone()));
        assert_eq!(builder.document().resources[0].full_url, "urn:uuid:inner");
        assert_eq!(builder.document().resources[0].resource, value);
    }

    #[test]
    fn near_miss_parent_is_left_alone() {
        let mut builder = DocumentBuilder::new();
        let parent = object(json!({"name": "input"}));
        let key = Key::Field("resource".into());
        let path = vec![Key::Field("parameter".into()), Key::Index(0)];
        let value = json!({"resourceType": "Patient"});

        let kept = builder.apply(ValueEvent {
            path: &path,
            key: &key,
            parent: Parent::Object(&parent),
            value: value.clone(),
        });

        assert_eq!(kept, Some(value));
        assert!(builder.document().resources.is_empty());
    }

    #[test]
    fn composition_fills_sections_and_is_not_a_resource() {
        let mut builder = DocumentBuilder::new();
        let parent = object(json!({"fullUrl": "urn:uuid:comp"}));
        let key = Key::Field("resource".into());
        let path = entry_path();

        builder.apply(ValueEvent {
            path: &path,
            key: &key,
            parent: Parent::Object(&parent),
            value: json!({
                "resourceType": "Composition",
                "title": "Summary",
                "section": [
                    {"code": {"coding": [{"code": "48765-2"}]}, "entry": [{"reference": "urn:uuid:a"}]},
                    {"title": 42},
                    {"code": {"coding": [{"code": "11450-4"}]}}
                ]
            }),
        });

        let doc = builder.document();
        assert!(doc.resources.is_empty());
        assert_eq!(doc.composition_title(), Some("Summary"));
        let codes: Vec<_> = doc.sections.iter().map(|s| s.section_code()).collect();
        assert_eq!(codes, vec![Some("48765-2"), Some("11450-4")]);
    }

    #[test]
    fn later_composition_overwrites_earlier() {
        let mut builder = DocumentBuilder::new();
        let key = Key::Field("resource".into());
        for code in ["first", "second"] {
            builder.apply(ValueEvent {
                path: &[],
                key: &key,
                parent: Parent::Root,
                value: json!({
                    "resourceType": "Composition",
                    "section": [{"code": {"coding": [{"code": code}]}}]
                }),
            });
        }
        assert_eq!(builder.document().sections.len(), 1);
        assert_eq!(builder.document().sections[0].section_code(), Some("second"));
    }

    #[test]
    fn composition_without_sections_is_treated_as_resource() {
        let mut builder = DocumentBuilder::new();
        let parent = object(json!({"fullUrl": "urn:uuid:c"}));
        let key = Key::Field("resource".into());
        builder.apply(ValueEvent {
            path: &entry_path(),
            key: &key,
            parent: Parent::Object(&parent),
            value: json!({"resourceType": "Composition"}),
        });
        assert!(builder.document().composition.is_none());
        assert_eq!(builder.document().resources.len(), 1);
    }

    #[test]
    fn completed_entry_recovers_late_full_url() {
        let mut builder = DocumentBuilder::new();
        let key = Key::Index(3);
        let path = vec![Key::Field("entry".into())];
        let entries: Vec<Value> = Vec::new();

        let kept = builder.apply(ValueEvent {
            path: &path,
            key: &key,
            parent: Parent::Array(&entries),
            value: json!({
                "resource": {"resourceType": "MedicationRequest"},
                "fullUrl": "urn:uuid:late"
            }),
        });

        assert!(kept.is_none());
        assert_eq!(builder.document().resources[0].full_url, "urn:uuid:late");
    }

    #[test]
    fn bundle_metadata_is_recorded() {
        let mut builder = DocumentBuilder::new();
        let root = Map::new();
        for (name, value) in [
            ("resourceType", "Bundle"),
            ("id", "b1"),
            ("type", "document"),
            ("timestamp", "2024-01-01T00:00:00Z"),
        ] {
            let key = Key::Field(name.into());
            let kept = builder.apply(ValueEvent {
                path: &[],
                key: &key,
                parent: Parent::Object(&root),
                value: json!(value),
            });
            assert!(kept.is_some());
        }
        assert_eq!(builder.root_type(), Some("Bundle"));
        let doc = builder.into_document();
        assert_eq!(doc.bundle_id.as_deref(), Some("b1"));
        assert_eq!(doc.bundle_type.as_deref(), Some("document"));
        assert!(doc.timestamp_utc().is_some());
    }
}
