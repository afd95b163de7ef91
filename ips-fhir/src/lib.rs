//! IPS section index and flattening.
//!
//! Turns a parsed [`IpsDocument`](ips_core::IpsDocument) into per-section flat records: one
//! [`SectionFlattener`] per clinical section, dispatched by [`SectionKind`](ips_core::SectionKind),
//! with medication dosage rendered as an English sentence by [`dosage::synthesize`].
//! [`IpsSummary`] caches the flattened sections of one loaded document.

pub mod dosage;
mod extract;
mod flatten;
mod index;
mod summary;

pub use flatten::{
    flattener, flattener_for_code, AllergyFlattener, DeviceFlattener, ImmunizationFlattener,
    MedicationFlattener, ProblemFlattener, ProcedureFlattener, ResultFlattener, SectionFlattener,
};
pub use index::{resources_for_section, SectionIndex};
pub use summary::{IpsSummary, PatientHeader};
