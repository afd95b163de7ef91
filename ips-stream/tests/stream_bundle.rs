use std::convert::Infallible;
use std::fs;
use std::io;

use futures::stream;
use ips_core::{IpsDocument, IpsError, LoadConfig, ParseErrorKind};
#[cfg(feature = "fs")]
use ips_stream::{load_file, load_reader};
use ips_stream::{load_stream, parse_chunks, parse_slice};
use pretty_assertions::assert_eq;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn fixture_bytes() -> Vec<u8> {
    fs::read(fixture_path("ips_bundle.json")).expect("fixture bundle missing")
}

fn parse_in_chunks(bytes: &[u8], size: usize) -> IpsDocument {
    let chunks = bytes.chunks(size).map(Ok::<_, Infallible>);
    parse_chunks(chunks, &LoadConfig::default()).expect("chunked parse failed")
}

#[test]
fn reconstructs_sections_and_resources_in_stream_order() {
    let doc = parse_slice(&fixture_bytes(), &LoadConfig::default()).unwrap();

    assert_eq!(doc.bundle_id.as_deref(), Some("ips-example-1"));
    assert_eq!(doc.bundle_type.as_deref(), Some("document"));
    assert_eq!(
        doc.composition_title(),
        Some("Patient Summary as of March 20, 2024")
    );

    let codes: Vec<_> = doc.sections.iter().filter_map(|s| s.section_code()).collect();
    assert_eq!(
        codes,
        vec!["48765-2", "10160-0", "11450-4", "47519-4", "11369-6", "30954-2"]
    );

    let types: Vec<_> = doc.resources.iter().filter_map(|e| e.resource_type()).collect();
    assert_eq!(
        types,
        vec![
            "Patient",
            "AllergyIntolerance",
            "MedicationStatement",
            "MedicationRequest",
            "Condition",
            "Procedure",
            "Immunization",
            "Observation",
            "Observation",
        ]
    );

    let patient = doc
        .resource_by_uri("urn:uuid:7685713c-e29e-4a75-8a90-45be7ba3be94")
        .unwrap();
    assert_eq!(patient["name"][0]["family"], "Martínez");
}

#[test]
fn contained_resources_are_not_promoted() {
    let doc = parse_slice(&fixture_bytes(), &LoadConfig::default()).unwrap();
    assert!(doc.first_of_type("Specimen").is_none());
    let observation = doc
        .resource_by_uri("urn:uuid:bb22ee6b-5a1c-4a6b-8b3e-2f1f0c5a9d02")
        .unwrap();
    assert_eq!(observation["contained"][0]["id"], "s1");
}

#[test]
fn nested_bundle_resource_keeps_its_payload() {
    let bytes = br#"{"resourceType": "Bundle", "entry": [{"fullUrl": "urn:outer", "resource": {"resourceType": "Bundle", "entry": [{"fullUrl": "urn:inner", "resource": {"resourceType": "Patient"}}]}}]}"#;
    let whole = parse_slice(bytes, &LoadConfig::default()).unwrap();

    let outer = whole.resource_by_uri("urn:outer").unwrap();
    assert_eq!(outer["entry"][0]["fullUrl"], "urn:inner");
    assert_eq!(outer["entry"][0]["resource"]["resourceType"], "Patient");

    let inner = whole.resource_by_uri("urn:inner").unwrap();
    assert_eq!(inner["resourceType"], "Patient");

    let chunked = parse_in_chunks(bytes, 5);
    assert_eq!(chunked.resources, whole.resources);
}

#[test]
fn result_is_independent_of_chunk_boundaries() {
    let bytes = fixture_bytes();
    let whole = parse_slice(&bytes, &LoadConfig::default()).unwrap();

    for size in [1, 2, 3, 7, 64, 1000] {
        let chunked = parse_in_chunks(&bytes, size);
        assert_eq!(chunked.resources, whole.resources, "chunk size {size}");
        assert_eq!(chunked.sections, whole.sections, "chunk size {size}");
    }
}

#[test]
fn truncated_stream_fails_with_parse_error() {
    let bytes = fixture_bytes();
    let cut = &bytes[..bytes.len() / 2];

    let err = parse_chunks(cut.chunks(128).map(Ok::<_, Infallible>), &LoadConfig::default())
        .unwrap_err();
    match err {
        IpsError::Parse(parse) => assert_eq!(parse.kind, ParseErrorKind::UnexpectedEnd),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn malformed_chunk_fails_with_offset() {
    let err = parse_chunks(
        vec![
            Ok::<_, Infallible>(&b"{\"resourceType\": \"Bundle\", "[..]),
            Ok(&b"\"entry\": [}"[..]),
        ],
        &LoadConfig::default(),
    )
    .unwrap_err();

    match err {
        IpsError::Parse(parse) => {
            assert_eq!(parse.offset, 37);
            assert_eq!(parse.kind, ParseErrorKind::UnexpectedToken("'}'"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn depth_limit_comes_from_config() {
    let config = LoadConfig {
        max_depth: 4,
        ..LoadConfig::default()
    };
    let err = parse_slice(&fixture_bytes(), &config).unwrap_err();
    assert!(matches!(
        err,
        IpsError::Parse(ref parse) if parse.kind == ParseErrorKind::DepthLimitExceeded(4)
    ));
}

#[tokio::test]
async fn async_stream_matches_slice_parse() {
    let bytes = fixture_bytes();
    let chunks: Vec<Result<Vec<u8>, io::Error>> =
        bytes.chunks(33).map(|chunk| Ok(chunk.to_vec())).collect();

    let doc = load_stream(stream::iter(chunks), &LoadConfig::default())
        .await
        .unwrap();
    let expected = parse_slice(&bytes, &LoadConfig::default()).unwrap();
    assert_eq!(doc, expected);
}

#[tokio::test]
async fn transport_failure_aborts_load() {
    let bytes = fixture_bytes();
    let chunks: Vec<Result<Vec<u8>, io::Error>> = vec![
        Ok(bytes[..200].to_vec()),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away")),
        Ok(bytes[200..].to_vec()),
    ];

    let err = load_stream(stream::iter(chunks), &LoadConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IpsError::Transport(_)));
    assert!(err.to_string().contains("peer went away"));
}

#[cfg(feature = "fs")]
#[tokio::test]
async fn reader_and_file_loaders_agree() {
    let bytes = fixture_bytes();
    let config = LoadConfig {
        read_chunk_size: 5,
        ..LoadConfig::default()
    };

    let from_reader = load_reader(&bytes[..], &config).await.unwrap();
    let from_file = load_file(fixture_path("ips_bundle.json"), &config)
        .await
        .unwrap();
    assert_eq!(from_reader, from_file);
    assert_eq!(from_file.resources.len(), 9);
}

#[cfg(feature = "fs")]
#[tokio::test]
async fn missing_file_is_a_transport_error() {
    let err = load_file(fixture_path("does_not_exist.json"), &LoadConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IpsError::Transport(_)));
}
