use std::collections::HashMap;

use ips_core::{FlattenedRecord, IpsDocument, IpsError, IpsResult, ResourceEnvelope, SectionKind};

use crate::flatten::flattener;

/// `fullUrl` lookup over a parsed document, plus section resolution.
pub struct SectionIndex<'a> {
    document: &'a IpsDocument,
    by_url: HashMap<&'a str, &'a ResourceEnvelope>,
}

impl<'a> SectionIndex<'a> {
    pub fn new(document: &'a IpsDocument) -> Self {
        let mut by_url = HashMap::with_capacity(document.resources.len());
        for envelope in &document.resources {
            if by_url.contains_key(envelope.full_url.as_str()) {
                tracing::warn!(full_url = %envelope.full_url, "duplicate fullUrl; keeping the first");
                continue;
            }
            by_url.insert(envelope.full_url.as_str(), envelope);
        }
        Self { document, by_url }
    }

    pub fn envelope(&self, uri: &str) -> Option<&'a ResourceEnvelope> {
        self.by_url.get(uri).copied()
    }

    /// Envelopes referenced by the section, in section order.
    ///
    /// References that match no envelope are dropped with a warning; the section then simply has
    /// fewer resources than it declares.
    pub fn resolve(&self, kind: SectionKind) -> IpsResult<Vec<&'a ResourceEnvelope>> {
        let section = self
            .document
            .section(kind.code())
            .ok_or_else(|| IpsError::SectionNotFound {
                code: kind.code().to_string(),
            })?;

        let mut dropped = 0usize;
        let envelopes: Vec<_> = section
            .references()
            .filter_map(|reference| {
                let found = self.envelope(reference);
                if found.is_none() {
                    dropped += 1;
                }
                found
            })
            .collect();

        if dropped > 0 {
            tracing::warn!(
                section = kind.code(),
                dropped,
                resolved = envelopes.len(),
                "section references resources missing from the bundle"
            );
        }
        Ok(envelopes)
    }

    pub fn flatten(&self, kind: SectionKind) -> IpsResult<Vec<FlattenedRecord>> {
        let strategy = flattener(kind);
        Ok(self
            .resolve(kind)?
            .into_iter()
            .map(|envelope| strategy.flatten(envelope))
            .collect())
    }
}

/// Flattened records of the section with `code`.
///
/// Fails with `UnknownSection` for a code outside the seven kinds, and with `SectionNotFound` when
/// the Composition has no such section.
pub fn resources_for_section(document: &IpsDocument, code: &str) -> IpsResult<Vec<FlattenedRecord>> {
    let kind = SectionKind::from_code(code)?;
    SectionIndex::new(document).flatten(kind)
}
