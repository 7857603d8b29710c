//! End-to-end normalization tests over real-shaped scanner fixtures.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use vulngate::{
    detect_format, normalize, ArtifactType, Ecosystem, FormatDetector, NormalizeOptions, Severity,
    SourceFormat, CANONICAL_SCHEMA_VERSION,
};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn load_fixture(relative: &str) -> String {
    let path = Path::new(FIXTURES_DIR).join(relative);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

fn pinned_options() -> NormalizeOptions {
    let scanned_at: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
    NormalizeOptions {
        scanned_at: Some(scanned_at),
        ..Default::default()
    }
}

#[test]
fn test_trivy_container_scan_end_to_end() {
    let content = load_fixture("trivy/container_scan.json");
    let scan = normalize(&content, SourceFormat::TrivyJson, &pinned_options()).unwrap();

    assert_eq!(scan.schema_version, CANONICAL_SCHEMA_VERSION);
    assert_eq!(scan.scanner.name, "trivy");
    assert_eq!(scan.scanner.original_schema_version.as_deref(), Some("2"));
    assert_eq!(scan.artifact.name, "registry.example.com/shop/api:1.4.2");
    assert_eq!(scan.artifact.artifact_type, ArtifactType::ContainerImage);
    assert!(scan
        .artifact
        .digest
        .as_deref()
        .unwrap()
        .starts_with("sha256:4a5f"));

    // Two OS findings plus one npm finding; the result with no
    // Vulnerabilities array contributes nothing.
    assert_eq!(scan.vulnerabilities.len(), 3);
    assert_eq!(scan.summary.total, 3);
    assert_eq!(scan.summary.by_severity[&Severity::Critical], 1);
    assert_eq!(scan.summary.by_severity[&Severity::High], 1);
    assert_eq!(scan.summary.by_severity[&Severity::Medium], 1);
    assert_eq!(scan.summary.by_severity[&Severity::Low], 0);
    assert_eq!(scan.summary.fixable, 2);
    assert_eq!(scan.summary.by_package_type[&Ecosystem::Alpine], 2);
    assert_eq!(scan.summary.by_package_type[&Ecosystem::Npm], 1);
}

#[test]
fn test_trivy_lodash_finding_details() {
    let content = load_fixture("trivy/container_scan.json");
    let scan = normalize(&content, SourceFormat::TrivyJson, &pinned_options()).unwrap();

    let lodash = scan
        .vulnerabilities
        .iter()
        .find(|f| f.package.name == "lodash")
        .unwrap();

    assert_eq!(lodash.cve_id, "CVE-2021-23337");
    assert_eq!(lodash.id.value(), "CVE-2021-23337:lodash:4.17.15");
    assert_eq!(lodash.severity, Severity::Critical);
    assert_eq!(lodash.cvss_v3_score, Some(9.8));
    assert_eq!(lodash.cvss_v2_score, Some(6.5));
    assert_eq!(lodash.effective_cvss_score(), Some(9.8));
    assert_eq!(lodash.package.installed_version, "4.17.15");
    assert_eq!(lodash.package.fixed_version.as_deref(), Some("4.17.21"));
    assert_eq!(lodash.package.ecosystem, Ecosystem::Npm);
    assert_eq!(
        lodash.package.path.as_deref(),
        Some("app/node_modules/lodash/package.json")
    );
    assert_eq!(lodash.cwe_ids, vec!["CWE-77", "CWE-94"]);
    assert!(lodash.patch_available());
    assert!(lodash.published_at.is_some());
    assert_eq!(lodash.metadata.data_sources, vec!["ghsa".to_string()]);
}

#[test]
fn test_trivy_cvss_namespace_preference() {
    let content = load_fixture("trivy/container_scan.json");
    let scan = normalize(&content, SourceFormat::TrivyJson, &pinned_options()).unwrap();

    // libcrypto3 carries both nvd and redhat metrics; nvd wins.
    let libcrypto = scan
        .vulnerabilities
        .iter()
        .find(|f| f.package.name == "libcrypto3")
        .unwrap();
    assert_eq!(libcrypto.cvss_v3_score, Some(7.5));
    assert_eq!(libcrypto.cvss_v2_score, Some(5.0));

    // libssl3 only has redhat metrics; they are used as fallback.
    let libssl = scan
        .vulnerabilities
        .iter()
        .find(|f| f.package.name == "libssl3")
        .unwrap();
    assert_eq!(libssl.cvss_v3_score, Some(5.5));
    assert_eq!(libssl.cvss_v2_score, None);
}

#[test]
fn test_sarif_image_scan_end_to_end() {
    let content = load_fixture("sarif/trivy_image.sarif.json");
    let scan = normalize(&content, SourceFormat::TrivySarif, &pinned_options()).unwrap();

    assert_eq!(scan.scanner.name, "trivy");
    assert_eq!(scan.scanner.version, "0.50.1");
    assert_eq!(scan.scanner.original_schema_version.as_deref(), Some("2.1.0"));
    assert_eq!(scan.artifact.name, "alpine:3.17.2");
    assert_eq!(scan.vulnerabilities.len(), 3);

    let openssl = &scan.vulnerabilities[0];
    assert_eq!(openssl.cve_id, "CVE-2023-0286");
    assert_eq!(openssl.severity, Severity::High);
    assert_eq!(openssl.cvss_v3_score, Some(7.4));
    assert_eq!(openssl.package.name, "libssl1.1");
    assert_eq!(openssl.package.installed_version, "1.1.1t-r0");
    assert_eq!(openssl.cwe_ids, vec!["CWE-843"]);
    assert_eq!(
        openssl.references,
        vec!["https://avd.aquasec.com/nvd/cve-2023-0286".to_string()]
    );
    assert_eq!(openssl.package.path.as_deref(), Some("lib/apk/db/installed"));

    let busybox = &scan.vulnerabilities[1];
    assert_eq!(busybox.severity, Severity::Critical);
    assert_eq!(busybox.package.name, "busybox");
}

#[test]
fn test_sarif_lossy_fallbacks() {
    let content = load_fixture("sarif/trivy_image.sarif.json");
    let scan = normalize(&content, SourceFormat::TrivySarif, &pinned_options()).unwrap();

    // Third result has no score (level fallback) and no parseable package.
    let placeholder = &scan.vulnerabilities[2];
    assert_eq!(placeholder.severity, Severity::Medium);
    assert_eq!(placeholder.package.name, "unknown");
    assert_eq!(placeholder.package.installed_version, "unknown");
    // SARIF carries no package-type data at all.
    assert!(scan
        .vulnerabilities
        .iter()
        .all(|f| f.package.ecosystem == Ecosystem::Other));
}

#[test]
fn test_grype_image_scan_end_to_end() {
    let content = load_fixture("grype/image_scan.json");
    let scan = normalize(&content, SourceFormat::GrypeJson, &pinned_options()).unwrap();

    assert_eq!(scan.scanner.name, "grype");
    assert_eq!(scan.scanner.version, "0.74.7");
    assert_eq!(scan.artifact.name, "shop/worker:2.1.0");
    assert_eq!(scan.artifact.artifact_type, ArtifactType::ContainerImage);
    assert_eq!(scan.vulnerabilities.len(), 2);

    let passwd = &scan.vulnerabilities[0];
    assert_eq!(passwd.cve_id, "CVE-2023-29383");
    assert_eq!(passwd.severity, Severity::Low);
    assert_eq!(passwd.package.ecosystem, Ecosystem::Debian);
    // fix state is not-fixed with no versions.
    assert!(passwd.package.fixed_version.is_none());
    assert_eq!(passwd.cvss_v3_score, Some(3.3));

    let py = &scan.vulnerabilities[1];
    assert_eq!(py.package.ecosystem, Ecosystem::Pip);
    assert_eq!(py.cvss_v3_score, Some(7.5));
    assert_eq!(py.cvss_v2_score, Some(5.0));
    assert_eq!(py.package.fixed_version.as_deref(), Some("1.12.0"));
    assert_eq!(
        py.layer.as_ref().unwrap().digest.as_deref(),
        Some("sha256:dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd")
    );

    assert_eq!(scan.summary.fixable, 1);
}

#[test]
fn test_snyk_project_end_to_end() {
    let content = load_fixture("snyk/npm_project.json");
    let scan = normalize(&content, SourceFormat::SnykJson, &pinned_options()).unwrap();

    assert_eq!(scan.scanner.name, "snyk");
    assert_eq!(scan.artifact.name, "shop-frontend");
    assert_eq!(scan.artifact.artifact_type, ArtifactType::Repository);
    assert_eq!(scan.vulnerabilities.len(), 2);

    let lodash = &scan.vulnerabilities[0];
    assert_eq!(lodash.cve_id, "CVE-2021-23337");
    assert_eq!(lodash.severity, Severity::Critical);
    assert!(lodash.metadata.exploit_available);
    assert_eq!(lodash.package.fixed_version.as_deref(), Some("4.17.21"));

    // No CVE id: the Snyk id is kept; fix comes from nearestFixedInVersion.
    let minimist = &scan.vulnerabilities[1];
    assert_eq!(minimist.cve_id, "SNYK-JS-MINIMIST-2429795");
    assert!(!minimist.metadata.exploit_available);
    assert_eq!(minimist.package.fixed_version.as_deref(), Some("1.2.6"));
    assert_eq!(minimist.package.ecosystem, Ecosystem::Npm);
}

#[test]
fn test_detection_identifies_all_fixtures() {
    let cases = [
        ("trivy/container_scan.json", SourceFormat::TrivyJson),
        ("sarif/trivy_image.sarif.json", SourceFormat::TrivySarif),
        ("grype/image_scan.json", SourceFormat::GrypeJson),
        ("snyk/npm_project.json", SourceFormat::SnykJson),
    ];
    for (fixture, expected) in cases {
        let content = load_fixture(fixture);
        let detected = detect_format(&content)
            .unwrap_or_else(|| panic!("no format detected for {fixture}"));
        assert_eq!(detected.format, expected, "fixture {fixture}");
        assert!(detected.confidence >= 0.75, "fixture {fixture}");
    }
}

#[test]
fn test_detected_normalization_matches_explicit_dispatch() {
    let content = load_fixture("grype/image_scan.json");
    let detector = FormatDetector::new();
    let options = pinned_options();

    let via_detection = detector.normalize_detected(&content, &options).unwrap();
    let explicit = detector
        .normalize(&content, SourceFormat::GrypeJson, &options)
        .unwrap();
    assert_eq!(via_detection, explicit);
}

#[test]
fn test_normalization_is_deterministic() {
    for fixture in [
        "trivy/container_scan.json",
        "sarif/trivy_image.sarif.json",
        "grype/image_scan.json",
        "snyk/npm_project.json",
    ] {
        let content = load_fixture(fixture);
        let format = detect_format(&content).unwrap().format;
        let first = normalize(&content, format, &pinned_options()).unwrap();
        let second = normalize(&content, format, &pinned_options()).unwrap();
        assert_eq!(first, second, "fixture {fixture}");
        assert_eq!(
            first.content_hash(),
            second.content_hash(),
            "fixture {fixture}"
        );
    }
}

#[test]
fn test_content_hash_is_scan_time_independent() {
    let content = load_fixture("trivy/container_scan.json");
    let early = normalize(&content, SourceFormat::TrivyJson, &pinned_options()).unwrap();

    let late_options = NormalizeOptions {
        scanned_at: Some("2025-01-01T00:00:00Z".parse().unwrap()),
        ..Default::default()
    };
    let late = normalize(&content, SourceFormat::TrivyJson, &late_options).unwrap();

    assert_ne!(early, late);
    assert_eq!(early.content_hash(), late.content_hash());
}

#[test]
fn test_canonical_output_serializes_and_round_trips() {
    let content = load_fixture("snyk/npm_project.json");
    let scan = normalize(&content, SourceFormat::SnykJson, &pinned_options()).unwrap();

    let json = serde_json::to_string_pretty(&scan).unwrap();
    let back: vulngate::NormalizedScanResult = serde_json::from_str(&json).unwrap();
    assert_eq!(scan, back);
    assert_eq!(scan.content_hash(), back.content_hash());
}
