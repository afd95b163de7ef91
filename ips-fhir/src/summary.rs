use std::collections::BTreeMap;
use std::error::Error as StdError;
#[cfg(feature = "fs")]
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures::Stream;
use ips_core::{
    FlattenedRecord, IpsDocument, IpsError, IpsResult, LoadConfig, ResourceEnvelope, SectionKind,
};
use serde::Serialize;
use serde_json::Value;

use crate::index::SectionIndex;

/// Header details for the patient the summary is about.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientHeader {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<i32>,
}

/// A loaded IPS document with every known section flattened once.
#[derive(Debug, Clone)]
pub struct IpsSummary {
    document: IpsDocument,
    flattened: BTreeMap<SectionKind, Vec<FlattenedRecord>>,
    loaded_at: DateTime<Utc>,
}

impl IpsSummary {
    /// Flatten all seven sections. Sections missing from the Composition are left out of the
    /// cache.
    pub fn from_document(document: IpsDocument) -> Self {
        let flattened = {
            let index = SectionIndex::new(&document);
            let mut flattened = BTreeMap::new();
            for kind in SectionKind::ALL {
                match index.flatten(kind) {
                    Ok(records) => {
                        flattened.insert(kind, records);
                    }
                    Err(err) => tracing::debug!(section = kind.code(), %err, "section unavailable"),
                }
            }
            flattened
        };

        tracing::info!(
            resources = document.resources.len(),
            sections = flattened.len(),
            "patient summary ready"
        );

        Self {
            document,
            flattened,
            loaded_at: Utc::now(),
        }
    }

    pub fn parse_slice(bytes: &[u8], config: &LoadConfig) -> IpsResult<Self> {
        ips_stream::parse_slice(bytes, config).map(Self::from_document)
    }

    pub async fn load_stream<S, B, E>(stream: S, config: &LoadConfig) -> IpsResult<Self>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        ips_stream::load_stream(stream, config)
            .await
            .map(Self::from_document)
    }

    #[cfg(feature = "fs")]
    pub async fn load_file(path: impl AsRef<Path>, config: &LoadConfig) -> IpsResult<Self> {
        ips_stream::load_file(path, config)
            .await
            .map(Self::from_document)
    }

    pub fn document(&self) -> &IpsDocument {
        &self.document
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Flattened records per section.
    ///
    /// Only sections present in the Composition have a key, so the map can hold fewer than seven
    /// entries; use [`available_sections`](Self::available_sections) to list them.
    pub fn flattened_by_section(&self) -> &BTreeMap<SectionKind, Vec<FlattenedRecord>> {
        &self.flattened
    }

    /// The same cache keyed by LOINC section code, the shape exported to JSON callers.
    pub fn flattened_by_code(&self) -> BTreeMap<&'static str, &[FlattenedRecord]> {
        self.flattened
            .iter()
            .map(|(kind, records)| (kind.code(), records.as_slice()))
            .collect()
    }

    pub fn flattened(&self, kind: SectionKind) -> Option<&[FlattenedRecord]> {
        self.flattened.get(&kind).map(Vec::as_slice)
    }

    /// Flattened records for a section code.
    pub fn resources_for_section(&self, code: &str) -> IpsResult<Vec<FlattenedRecord>> {
        let kind = SectionKind::from_code(code)?;
        self.flattened(kind)
            .map(<[FlattenedRecord]>::to_vec)
            .ok_or_else(|| IpsError::SectionNotFound {
                code: code.to_string(),
            })
    }

    /// Original resource behind a flattened record.
    pub fn resource_by_uri(&self, uri: &str) -> Option<&Value> {
        self.document.resource_by_uri(uri)
    }

    /// Envelopes of the section whose `fullUrl` is among `uris`, in section order.
    pub fn envelopes_for_selection<S>(
        &self,
        code: &str,
        uris: &[S],
    ) -> IpsResult<Vec<&ResourceEnvelope>>
    where
        S: AsRef<str>,
    {
        let kind = SectionKind::from_code(code)?;
        let envelopes = SectionIndex::new(&self.document).resolve(kind)?;
        Ok(envelopes
            .into_iter()
            .filter(|envelope| uris.iter().any(|uri| uri.as_ref() == envelope.full_url))
            .collect())
    }

    /// Known sections present in the Composition, in Composition order.
    pub fn available_sections(&self) -> Vec<SectionKind> {
        let mut kinds = Vec::new();
        for section in &self.document.sections {
            let kind = SectionKind::ALL
                .into_iter()
                .find(|kind| section.has_code(kind.code()));
            if let Some(kind) = kind.filter(|kind| !kinds.contains(kind)) {
                kinds.push(kind);
            }
        }
        kinds
    }

    pub fn patient(&self) -> Option<PatientHeader> {
        let resource = &self.document.first_of_type("Patient")?.resource;
        let birth_date = resource
            .get("birthDate")
            .and_then(Value::as_str)
            .and_then(parse_date);

        Some(PatientHeader {
            name: extract_patient_name(resource),
            gender: resource
                .get("gender")
                .and_then(Value::as_str)
                .map(str::to_string),
            birth_date,
            age: birth_date.and_then(|date| age_on(date, self.loaded_at.date_naive())),
        })
    }
}

fn extract_patient_name(resource: &Value) -> Option<String> {
    let name = resource.get("name")?.as_array()?.first()?;
    if let Some(text) = name.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.trim().to_string());
        }
    }

    let given = name
        .get("given")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    let family = name.get("family").and_then(Value::as_str).unwrap_or("");
    let full = format!("{given} {family}").trim().to_string();
    if full.is_empty() {
        None
    } else {
        Some(full)
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<i32> {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    (age >= 0).then_some(age)
}
