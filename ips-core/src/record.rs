//! Bản ghi phẳng cho từng loại section, dùng cho bảng hiển thị và phát hành credential.

use serde::{Deserialize, Serialize};

use crate::SectionKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllergyRecord {
    pub uri: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub criticality: Option<String>,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
    pub recorded_date: Option<String>,
    #[serde(rename = "type")]
    pub allergy_type: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub uri: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub intent: Option<String>,
    pub status: Option<String>,
    pub authored_on: Option<String>,
    pub dosage_instructions: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
    pub uri: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
    pub onset_date_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureRecord {
    pub uri: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub status: Option<String>,
    pub performed_start: Option<String>,
    pub performed_end: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImmunizationRecord {
    pub uri: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
}

/// Giá trị vô hướng của một kết quả xét nghiệm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResultValue {
    Number(serde_json::Number),
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub uri: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub status: Option<String>,
    pub effective_date_time: Option<String>,
    pub value: Option<ResultValue>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub uri: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub status: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
}

/// Một bản ghi đã làm phẳng; serialize thành object phẳng không có tag.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FlattenedRecord {
    Allergy(AllergyRecord),
    Medication(MedicationRecord),
    Problem(ProblemRecord),
    Procedure(ProcedureRecord),
    Immunization(ImmunizationRecord),
    Result(ResultRecord),
    Device(DeviceRecord),
}

impl FlattenedRecord {
    pub fn kind(&self) -> SectionKind {
        match self {
            FlattenedRecord::Allergy(_) => SectionKind::Allergies,
            FlattenedRecord::Medication(_) => SectionKind::Medications,
            FlattenedRecord::Problem(_) => SectionKind::Problems,
            FlattenedRecord::Procedure(_) => SectionKind::Procedures,
            FlattenedRecord::Immunization(_) => SectionKind::Immunizations,
            FlattenedRecord::Result(_) => SectionKind::Results,
            FlattenedRecord::Device(_) => SectionKind::Devices,
        }
    }

    /// `fullUrl` của envelope gốc.
    pub fn uri(&self) -> &str {
        match self {
            FlattenedRecord::Allergy(r) => &r.uri,
            FlattenedRecord::Medication(r) => &r.uri,
            FlattenedRecord::Problem(r) => &r.uri,
            FlattenedRecord::Procedure(r) => &r.uri,
            FlattenedRecord::Immunization(r) => &r.uri,
            FlattenedRecord::Result(r) => &r.uri,
            FlattenedRecord::Device(r) => &r.uri,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            FlattenedRecord::Allergy(r) => r.name.as_deref(),
            FlattenedRecord::Medication(r) => r.name.as_deref(),
            FlattenedRecord::Problem(r) => r.name.as_deref(),
            FlattenedRecord::Procedure(r) => r.name.as_deref(),
            FlattenedRecord::Immunization(r) => r.name.as_deref(),
            FlattenedRecord::Result(r) => r.name.as_deref(),
            FlattenedRecord::Device(r) => r.name.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn allergy_serializes_flat_with_fhir_names() {
        let record = FlattenedRecord::Allergy(AllergyRecord {
            uri: "urn:uuid:1".into(),
            name: Some("Peanut".into()),
            allergy_type: Some("allergy".into()),
            ..AllergyRecord::default()
        });

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["uri"], "urn:uuid:1");
        assert_eq!(value["type"], "allergy");
        assert_eq!(value["codeSystem"], json!(null));
        assert_eq!(record.kind(), SectionKind::Allergies);
        assert_eq!(record.name(), Some("Peanut"));
    }

    #[test]
    fn result_value_keeps_scalar_shape() {
        let record = ResultRecord {
            uri: "urn:uuid:2".into(),
            value: Some(ResultValue::Number(serde_json::Number::from(7))),
            unit: Some("mmol/L".into()),
            ..ResultRecord::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["value"], json!(7));
        assert_eq!(value["effectiveDateTime"], json!(null));
    }
}
