//! Bridge WASM <-> JavaScript: nạp IPS theo từng chunk và truy vấn section.

use ips_core::{IpsError, LoadConfig};
use ips_fhir::IpsSummary;
use ips_stream::BundleStreamParser;
use serde::Deserialize;
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsLoadConfig {
    #[serde(default)]
    max_depth: Option<usize>,
    #[serde(default)]
    read_chunk_size: Option<usize>,
}

impl From<JsLoadConfig> for LoadConfig {
    fn from(cfg: JsLoadConfig) -> Self {
        let mut base = LoadConfig::default();
        if let Some(depth) = cfg.max_depth {
            base.max_depth = depth;
        }
        if let Some(size) = cfg.read_chunk_size {
            base.read_chunk_size = size;
        }
        base
    }
}

/// Bộ nạp tăng dần: JS đẩy từng chunk văn bản nhận được từ `fetch`.
#[wasm_bindgen]
pub struct IpsLoader {
    inner: BundleStreamParser,
}

#[wasm_bindgen]
impl IpsLoader {
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<JsValue>) -> Result<IpsLoader, JsValue> {
        #[cfg(target_arch = "wasm32")]
        console_error_panic_hook::set_once();

        let cfg = match config {
            Some(js_cfg) => {
                let cfg: JsLoadConfig = from_value(js_cfg)
                    .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
                LoadConfig::from(cfg)
            }
            None => LoadConfig::default(),
        };

        Ok(IpsLoader {
            inner: BundleStreamParser::new(&cfg),
        })
    }

    /// Đẩy một chunk; lỗi cú pháp làm hỏng cả lần nạp.
    #[wasm_bindgen(js_name = pushChunk)]
    pub fn push_chunk(&mut self, chunk: &str) -> Result<(), JsValue> {
        self.inner
            .push(chunk.as_bytes())
            .map_err(|err| JsValue::from_str(&format_ips_error(err.into())))
    }

    /// Chunk nhị phân (ví dụ `Uint8Array` từ `ReadableStream`).
    #[wasm_bindgen(js_name = pushBytes)]
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Result<(), JsValue> {
        self.inner
            .push(chunk)
            .map_err(|err| JsValue::from_str(&format_ips_error(err.into())))
    }

    /// Kết thúc luồng và trả về phiên truy vấn.
    pub fn finish(self) -> Result<IpsSession, JsValue> {
        let document = self
            .inner
            .finish()
            .map_err(|err| JsValue::from_str(&format_ips_error(err.into())))?;
        Ok(IpsSession {
            summary: IpsSummary::from_document(document),
        })
    }
}

/// Tài liệu đã nạp cùng các section đã làm phẳng.
#[wasm_bindgen]
pub struct IpsSession {
    summary: IpsSummary,
}

#[wasm_bindgen]
impl IpsSession {
    /// Bản ghi phẳng của một section theo mã LOINC.
    pub fn section(&self, code: &str) -> Result<JsValue, JsValue> {
        let records = self
            .summary
            .resources_for_section(code)
            .map_err(|err| JsValue::from_str(&format_ips_error(err)))?;
        serialize(&records)
    }

    /// Toàn bộ section đã làm phẳng, khoá theo mã LOINC của section.
    pub fn flattened(&self) -> Result<JsValue, JsValue> {
        serialize(&self.summary.flattened_by_code())
    }

    /// Resource gốc theo `fullUrl`, `undefined` nếu không có.
    pub fn resource(&self, uri: &str) -> Result<JsValue, JsValue> {
        match self.summary.resource_by_uri(uri) {
            Some(resource) => serialize(resource),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Envelope được chọn để đóng gói credential.
    #[wasm_bindgen(js_name = selectedEnvelopes)]
    pub fn selected_envelopes(&self, code: &str, uris: Vec<String>) -> Result<JsValue, JsValue> {
        let envelopes = self
            .summary
            .envelopes_for_selection(code, &uris)
            .map_err(|err| JsValue::from_str(&format_ips_error(err)))?;
        serialize(&envelopes)
    }

    pub fn patient(&self) -> Result<JsValue, JsValue> {
        serialize(&self.summary.patient())
    }
}

fn serialize<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|err| JsValue::from_str(&format!("Không serialize được kết quả: {err}")))
}

fn format_ips_error(err: IpsError) -> String {
    format!("IPS error: {err}")
}
