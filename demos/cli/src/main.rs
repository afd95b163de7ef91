use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ips_core::{FlattenedRecord, LoadConfig, SectionKind};
use ips_fhir::IpsSummary;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "ips-cli",
    about = "Đọc bundle IPS theo luồng và in các section đã làm phẳng."
)]
struct Args {
    /// Đường dẫn tới file JSON bundle.
    #[arg(short, long)]
    input: PathBuf,

    /// Chỉ in section có mã LOINC này (ví dụ 48765-2).
    #[arg(short, long)]
    section: Option<String>,

    /// In JSON thay vì bảng.
    #[arg(long)]
    json: bool,

    /// Số byte mỗi lần đọc file.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Độ sâu lồng nhau tối đa của JSON.
    #[arg(long)]
    max_depth: Option<usize>,
}

impl Args {
    fn load_config(&self) -> LoadConfig {
        let mut config = LoadConfig::default();
        if let Some(size) = self.chunk_size {
            config.read_chunk_size = size;
        }
        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ips=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let summary = IpsSummary::load_file(&args.input, &args.load_config())
        .await
        .with_context(|| format!("Không nạp được bundle {:?}", args.input))?;

    if let Some(code) = &args.section {
        let records = summary
            .resources_for_section(code)
            .with_context(|| format!("Không truy vấn được section {code}"))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            print_section(SectionKind::from_code(code)?, &records)?;
        }
        return Ok(());
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary.flattened_by_code())?
        );
        return Ok(());
    }

    let document = summary.document();
    println!(
        "Loaded at: {}\nBundle: {}\nResources: {}",
        summary.loaded_at(),
        document.bundle_id.as_deref().unwrap_or("-"),
        document.resources.len()
    );
    if let Some(patient) = summary.patient() {
        println!(
            "Patient: {} ({})",
            patient.name.as_deref().unwrap_or("-"),
            patient.gender.as_deref().unwrap_or("-")
        );
    }
    for kind in summary.available_sections() {
        if let Some(records) = summary.flattened(kind) {
            print_section(kind, records)?;
        }
    }

    Ok(())
}

fn print_section(kind: SectionKind, records: &[FlattenedRecord]) -> anyhow::Result<()> {
    println!("\n== {kind}: {} record(s)", records.len());
    for record in records {
        let Value::Object(fields) = serde_json::to_value(record)? else {
            continue;
        };
        let cells: Vec<String> = fields
            .iter()
            .filter(|(key, value)| key.as_str() != "uri" && !value.is_null())
            .map(|(key, value)| match value {
                Value::String(text) => format!("{key}={text}"),
                other => format!("{key}={other}"),
            })
            .collect();
        println!("- {}", cells.join(" | "));
    }
    Ok(())
}
