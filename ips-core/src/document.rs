use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cặp `{fullUrl, resource}` trong mảng `entry` của Bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceEnvelope {
    #[serde(rename = "fullUrl")]
    pub full_url: String,
    pub resource: Value,
}

impl ResourceEnvelope {
    pub fn new(full_url: impl Into<String>, resource: Value) -> Self {
        Self {
            full_url: full_url.into(),
            resource,
        }
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource.get("resourceType").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coding {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionReference {
    #[serde(default)]
    pub reference: Option<String>,
}

/// Một phần tử của `Composition.section`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositionSection {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub code: Option<CodeableConcept>,
    #[serde(default)]
    pub entry: Vec<SectionReference>,
}

impl CompositionSection {
    /// Mã của coding đầu tiên.
    pub fn section_code(&self) -> Option<&str> {
        self.code
            .as_ref()?
            .coding
            .iter()
            .find_map(|coding| coding.code.as_deref())
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_ref().is_some_and(|concept| {
            concept
                .coding
                .iter()
                .any(|coding| coding.code.as_deref() == Some(code))
        })
    }

    /// Các `reference` theo thứ tự khai báo, bỏ qua mục rỗng.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.entry
            .iter()
            .filter_map(|entry| entry.reference.as_deref())
    }
}

/// Bundle đã dựng lại từ luồng sự kiện.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpsDocument {
    pub bundle_id: Option<String>,
    pub bundle_type: Option<String>,
    pub timestamp: Option<String>,
    /// `None` cho tới khi gặp resource Composition trong luồng.
    pub composition: Option<Value>,
    pub sections: Vec<CompositionSection>,
    /// Theo thứ tự xuất hiện trong luồng.
    pub resources: Vec<ResourceEnvelope>,
}

impl IpsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelope đầu tiên có `fullUrl` trùng khớp.
    pub fn envelope_by_uri(&self, uri: &str) -> Option<&ResourceEnvelope> {
        self.resources.iter().find(|envelope| envelope.full_url == uri)
    }

    pub fn resource_by_uri(&self, uri: &str) -> Option<&Value> {
        self.envelope_by_uri(uri).map(|envelope| &envelope.resource)
    }

    pub fn section(&self, code: &str) -> Option<&CompositionSection> {
        self.sections.iter().find(|section| section.has_code(code))
    }

    pub fn composition_title(&self) -> Option<&str> {
        self.composition.as_ref()?.get("title")?.as_str()
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Resource đầu tiên thuộc loại cho trước.
    pub fn first_of_type(&self, resource_type: &str) -> Option<&ResourceEnvelope> {
        self.resources
            .iter()
            .find(|envelope| envelope.resource_type() == Some(resource_type))
    }
}
