//! Kiểu dữ liệu lõi cho International Patient Summary (IPS): tài liệu đã dựng lại,
//! danh mục section và các bản ghi đã làm phẳng.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod document;
mod error;
mod record;

pub use document::{
    Coding, CodeableConcept, CompositionSection, IpsDocument, ResourceEnvelope, SectionReference,
};
pub use error::{IpsError, IpsResult, ParseError, ParseErrorKind};
pub use record::{
    AllergyRecord, DeviceRecord, FlattenedRecord, ImmunizationRecord, MedicationRecord,
    ProblemRecord, ProcedureRecord, ResultRecord, ResultValue,
};

/// Cấu hình cho một lần nạp bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoadConfig {
    /// Độ sâu lồng nhau tối đa của JSON trước khi báo lỗi.
    pub max_depth: usize,
    /// Kích thước buffer (byte) khi tự đọc từ file hoặc `AsyncRead`.
    pub read_chunk_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            read_chunk_size: 16 * 1024,
        }
    }
}

/// Bảy section lâm sàng được hỗ trợ, khoá theo mã LOINC của Composition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Allergies,
    Medications,
    Problems,
    Procedures,
    Immunizations,
    Results,
    Devices,
}

impl SectionKind {
    pub const ALL: [SectionKind; 7] = [
        SectionKind::Allergies,
        SectionKind::Medications,
        SectionKind::Problems,
        SectionKind::Procedures,
        SectionKind::Immunizations,
        SectionKind::Results,
        SectionKind::Devices,
    ];

    /// Mã LOINC của section.
    pub fn code(self) -> &'static str {
        match self {
            SectionKind::Allergies => "48765-2",
            SectionKind::Medications => "10160-0",
            SectionKind::Problems => "11450-4",
            SectionKind::Procedures => "47519-4",
            SectionKind::Immunizations => "11369-6",
            SectionKind::Results => "30954-2",
            SectionKind::Devices => "46264-8",
        }
    }

    /// Nhãn hiển thị.
    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Allergies => "Allergies and Intolerances",
            SectionKind::Medications => "Medication Summary",
            SectionKind::Problems => "Problem List",
            SectionKind::Procedures => "History of Procedures",
            SectionKind::Immunizations => "Immunizations",
            SectionKind::Results => "Results",
            SectionKind::Devices => "Medical Devices",
        }
    }

    /// Tra cứu theo mã; mã lạ trả về `IpsError::UnknownSection`.
    pub fn from_code(code: &str) -> IpsResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or_else(|| IpsError::UnknownSection(code.to_string()))
    }
}

impl FromStr for SectionKind {
    type Err = IpsError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::from_code(code.trim())
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_lookup() {
        for kind in SectionKind::ALL {
            assert_eq!(SectionKind::from_code(kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = SectionKind::from_code("99999-9").unwrap_err();
        assert!(matches!(err, IpsError::UnknownSection(code) if code == "99999-9"));
    }

    #[test]
    fn parse_trims_whitespace() {
        let kind: SectionKind = " 11450-4 ".parse().unwrap();
        assert_eq!(kind, SectionKind::Problems);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: LoadConfig = serde_json::from_str(r#"{"max_depth": 32}"#).unwrap();
        assert_eq!(cfg.max_depth, 32);
        assert_eq!(cfg.read_chunk_size, LoadConfig::default().read_chunk_size);
    }
}
