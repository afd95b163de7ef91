//! One flattening strategy per clinical section.

use ips_core::{
    AllergyRecord, DeviceRecord, FlattenedRecord, ImmunizationRecord, IpsResult,
    MedicationRecord, ProblemRecord, ProcedureRecord, ResourceEnvelope, ResultRecord, ResultValue,
    SectionKind,
};
use serde_json::Value;

use crate::dosage;
use crate::extract::{code_and_system, coded_name, first_element, first_str_at, status_code, str_at};

/// Converts one resource envelope of a section into its flat record.
///
/// Implementations never fail: missing optional data becomes `None`.
pub trait SectionFlattener: Sync {
    fn kind(&self) -> SectionKind;

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord;
}

/// Strategy for a known section.
pub fn flattener(kind: SectionKind) -> &'static dyn SectionFlattener {
    match kind {
        SectionKind::Allergies => &AllergyFlattener,
        SectionKind::Medications => &MedicationFlattener,
        SectionKind::Problems => &ProblemFlattener,
        SectionKind::Procedures => &ProcedureFlattener,
        SectionKind::Immunizations => &ImmunizationFlattener,
        SectionKind::Results => &ResultFlattener,
        SectionKind::Devices => &DeviceFlattener,
    }
}

/// Strategy by section code; fails with `UnknownSection` for codes outside the seven kinds.
pub fn flattener_for_code(code: &str) -> IpsResult<&'static dyn SectionFlattener> {
    SectionKind::from_code(code).map(flattener)
}

pub struct AllergyFlattener;

impl SectionFlattener for AllergyFlattener {
    fn kind(&self) -> SectionKind {
        SectionKind::Allergies
    }

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord {
        let resource = &envelope.resource;
        let concept = resource.get("code");
        let (code, code_system) = code_and_system(concept);

        let category = resource
            .get("category")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|joined| !joined.is_empty());

        FlattenedRecord::Allergy(AllergyRecord {
            uri: envelope.full_url.clone(),
            name: coded_name(concept),
            code,
            code_system,
            criticality: str_at(resource, &["criticality"]),
            clinical_status: status_code(resource.get("clinicalStatus")),
            verification_status: status_code(resource.get("verificationStatus")),
            recorded_date: str_at(resource, &["recordedDate"]),
            allergy_type: str_at(resource, &["type"]),
            category,
        })
    }
}

pub struct MedicationFlattener;

impl SectionFlattener for MedicationFlattener {
    fn kind(&self) -> SectionKind {
        SectionKind::Medications
    }

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord {
        let resource = &envelope.resource;
        let concept = resource.get("medicationCodeableConcept");
        let (code, code_system) = code_and_system(concept);

        let name = coded_name(concept)
            .or_else(|| str_at(resource, &["medicationReference", "display"]));

        let instructions = resource
            .get("dosageInstruction")
            .or_else(|| resource.get("dosage"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        FlattenedRecord::Medication(MedicationRecord {
            uri: envelope.full_url.clone(),
            name,
            code,
            code_system,
            intent: str_at(resource, &["intent"]),
            status: str_at(resource, &["status"]),
            authored_on: first_str_at(
                resource,
                &[
                    &["authoredOn"],
                    &["effectiveDateTime"],
                    &["effectivePeriod", "start"],
                    &["dateAsserted"],
                ],
            ),
            dosage_instructions: dosage::synthesize(instructions),
        })
    }
}

pub struct ProblemFlattener;

impl SectionFlattener for ProblemFlattener {
    fn kind(&self) -> SectionKind {
        SectionKind::Problems
    }

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord {
        let resource = &envelope.resource;
        let concept = resource.get("code");
        let (code, code_system) = code_and_system(concept);

        FlattenedRecord::Problem(ProblemRecord {
            uri: envelope.full_url.clone(),
            name: coded_name(concept),
            code,
            code_system,
            clinical_status: status_code(resource.get("clinicalStatus")),
            verification_status: status_code(resource.get("verificationStatus")),
            onset_date_time: first_str_at(
                resource,
                &[&["onsetDateTime"], &["onsetPeriod", "start"]],
            ),
        })
    }
}

pub struct ProcedureFlattener;

impl SectionFlattener for ProcedureFlattener {
    fn kind(&self) -> SectionKind {
        SectionKind::Procedures
    }

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord {
        let resource = &envelope.resource;
        let concept = resource.get("code");
        let (code, code_system) = code_and_system(concept);

        FlattenedRecord::Procedure(ProcedureRecord {
            uri: envelope.full_url.clone(),
            name: coded_name(concept),
            code,
            code_system,
            status: str_at(resource, &["status"]),
            performed_start: first_str_at(
                resource,
                &[&["performedPeriod", "start"], &["performedDateTime"]],
            ),
            performed_end: str_at(resource, &["performedPeriod", "end"]),
        })
    }
}

pub struct ImmunizationFlattener;

impl SectionFlattener for ImmunizationFlattener {
    fn kind(&self) -> SectionKind {
        SectionKind::Immunizations
    }

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord {
        let resource = &envelope.resource;
        let concept = resource.get("vaccineCode");
        let (code, code_system) = code_and_system(concept);

        FlattenedRecord::Immunization(ImmunizationRecord {
            uri: envelope.full_url.clone(),
            name: coded_name(concept),
            code,
            code_system,
            status: str_at(resource, &["status"]),
            date: first_str_at(resource, &[&["occurrenceDateTime"], &["occurrenceString"]]),
        })
    }
}

pub struct ResultFlattener;

impl SectionFlattener for ResultFlattener {
    fn kind(&self) -> SectionKind {
        SectionKind::Results
    }

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord {
        let resource = &envelope.resource;
        let concept = resource.get("code");
        let (code, code_system) = code_and_system(concept);

        FlattenedRecord::Result(ResultRecord {
            uri: envelope.full_url.clone(),
            name: coded_name(concept),
            code,
            code_system,
            status: str_at(resource, &["status"]),
            effective_date_time: first_str_at(
                resource,
                &[&["effectiveDateTime"], &["effectivePeriod", "start"]],
            ),
            value: observation_value(resource),
            unit: first_str_at(
                resource,
                &[&["valueQuantity", "unit"], &["valueQuantity", "code"]],
            ),
        })
    }
}

fn observation_value(resource: &Value) -> Option<ResultValue> {
    if let Some(Value::Number(number)) = resource.get("valueQuantity").and_then(|q| q.get("value"))
    {
        return Some(ResultValue::Number(number.clone()));
    }
    if let Some(text) = str_at(resource, &["valueString"]) {
        return Some(ResultValue::Text(text));
    }
    if let Some(text) = coded_name(resource.get("valueCodeableConcept")) {
        return Some(ResultValue::Text(text));
    }
    if let Some(flag) = resource.get("valueBoolean").and_then(Value::as_bool) {
        return Some(ResultValue::Flag(flag));
    }
    match resource.get("valueInteger") {
        Some(Value::Number(number)) => Some(ResultValue::Number(number.clone())),
        _ => None,
    }
}

pub struct DeviceFlattener;

impl SectionFlattener for DeviceFlattener {
    fn kind(&self) -> SectionKind {
        SectionKind::Devices
    }

    fn flatten(&self, envelope: &ResourceEnvelope) -> FlattenedRecord {
        let resource = &envelope.resource;
        let concept = resource.get("type");
        let (code, code_system) = code_and_system(concept);

        let name = first_element(resource, "deviceName")
            .and_then(|device_name| str_at(device_name, &["name"]))
            .or_else(|| coded_name(concept))
            .or_else(|| str_at(resource, &["device", "display"]));

        FlattenedRecord::Device(DeviceRecord {
            uri: envelope.full_url.clone(),
            name,
            code,
            code_system,
            status: str_at(resource, &["status"]),
            manufacturer: str_at(resource, &["manufacturer"]),
            model: first_str_at(resource, &[&["modelNumber"], &["model"]]),
            version: first_element(resource, "version")
                .and_then(|version| str_at(version, &["value"])),
        })
    }
}
