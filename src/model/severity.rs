//! Canonical severity, ecosystem, and artifact-type enumerations.
//!
//! Every scanner speaks its own vocabulary; these mappings are total.
//! Anything a table does not recognize lands on the explicit catch-all
//! variant (`Unknown` / `Other`), never on an error.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical vulnerability severity.
///
/// Ordering is by rank: `Critical > High > Medium > Low > Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    /// All canonical severities, highest first.
    ///
    /// Summary maps are zero-filled from this list so every key is always
    /// present regardless of what a scan contained.
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Unknown,
    ];

    /// Severity rank, higher is more severe.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Unknown => 0,
        }
    }

    /// Human-readable name (canonical upper-case form).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a scanner-specific severity string to the canonical enumeration.
///
/// Matching is case-insensitive and total: empty, absent, or unrecognized
/// input maps to [`Severity::Unknown`]. Never panics.
#[must_use]
pub fn map_severity(raw: &str) -> Severity {
    match raw.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" => Severity::Low,
        _ => Severity::Unknown,
    }
}

/// Map a CVSS-style numeric score (SARIF `security-severity`) to a severity
/// band: ≥9.0 Critical, ≥7.0 High, ≥4.0 Medium, >0 Low, else Unknown.
#[must_use]
pub fn map_sarif_severity(score: Option<f64>) -> Severity {
    match score {
        Some(s) if s >= 9.0 => Severity::Critical,
        Some(s) if s >= 7.0 => Severity::High,
        Some(s) if s >= 4.0 => Severity::Medium,
        Some(s) if s > 0.0 => Severity::Low,
        _ => Severity::Unknown,
    }
}

/// Map a SARIF `security-severity` property, which tools emit either as a
/// JSON number or as a string like `"9.8"`.
#[must_use]
pub fn map_sarif_severity_str(score: Option<&str>) -> Severity {
    map_sarif_severity(score.and_then(|s| s.trim().parse::<f64>().ok()))
}

/// Package-manager / OS-distribution classification of an affected package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ecosystem {
    Npm,
    Pip,
    Maven,
    Gradle,
    Nuget,
    Go,
    Cargo,
    Composer,
    Gem,
    Alpine,
    Debian,
    Ubuntu,
    Redhat,
    Centos,
    AmazonLinux,
    OracleLinux,
    Photon,
    Suse,
    Other,
}

impl Ecosystem {
    /// Canonical kebab-case name, matching the serialized form.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pip => "pip",
            Self::Maven => "maven",
            Self::Gradle => "gradle",
            Self::Nuget => "nuget",
            Self::Go => "go",
            Self::Cargo => "cargo",
            Self::Composer => "composer",
            Self::Gem => "gem",
            Self::Alpine => "alpine",
            Self::Debian => "debian",
            Self::Ubuntu => "ubuntu",
            Self::Redhat => "redhat",
            Self::Centos => "centos",
            Self::AmazonLinux => "amazon-linux",
            Self::OracleLinux => "oracle-linux",
            Self::Photon => "photon",
            Self::Suse => "suse",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a scanner package-type identifier to a canonical [`Ecosystem`].
///
/// The alias table covers the identifiers Trivy, Grype, and Snyk emit for
/// each package manager (Trivy result `Type`, Grype artifact `type`/
/// `language`, Snyk `packageManager`). Lookup is case-insensitive; anything
/// unmapped returns [`Ecosystem::Other`].
#[must_use]
pub fn map_ecosystem(raw: &str) -> Ecosystem {
    match raw.trim().to_ascii_lowercase().as_str() {
        "npm" | "node-pkg" | "yarn" | "pnpm" | "javascript" | "js" => Ecosystem::Npm,
        "pip" | "pipenv" | "poetry" | "python" | "python-pkg" | "pypi" => Ecosystem::Pip,
        "maven" | "jar" | "pom" | "java" | "java-archive" => Ecosystem::Maven,
        "gradle" | "gradle-lockfile" => Ecosystem::Gradle,
        "nuget" | "dotnet" | "dotnet-core" | ".net" => Ecosystem::Nuget,
        "go" | "golang" | "gomod" | "gobinary" | "go-module" => Ecosystem::Go,
        "cargo" | "rust" | "rust-crate" | "rustbinary" => Ecosystem::Cargo,
        "composer" | "php" => Ecosystem::Composer,
        "gem" | "gemspec" | "bundler" | "ruby" | "rubygems" => Ecosystem::Gem,
        "alpine" | "apk" => Ecosystem::Alpine,
        "debian" | "deb" => Ecosystem::Debian,
        "ubuntu" => Ecosystem::Ubuntu,
        "redhat" | "rhel" | "red hat" => Ecosystem::Redhat,
        "centos" => Ecosystem::Centos,
        "amazon" | "amazon-linux" | "amazonlinux" | "amzn" => Ecosystem::AmazonLinux,
        "oracle" | "oracle-linux" | "oraclelinux" | "ol" => Ecosystem::OracleLinux,
        "photon" => Ecosystem::Photon,
        "suse" | "opensuse" | "opensuse-leap" | "sles" | "suse linux enterprise server" => {
            Ecosystem::Suse
        }
        _ => Ecosystem::Other,
    }
}

/// What kind of artifact a scan targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    ContainerImage,
    Filesystem,
    Repository,
    VmImage,
    Rootfs,
    Sbom,
    Other,
}

/// Map a scanner artifact-type identifier to a canonical [`ArtifactType`].
///
/// Same fixed-table pattern as [`map_ecosystem`]; unmapped input → `Other`.
#[must_use]
pub fn map_artifact_type(raw: &str) -> ArtifactType {
    match raw.trim().to_ascii_lowercase().as_str() {
        "container_image" | "container-image" | "image" | "docker" | "oci" | "oci-archive"
        | "docker-archive" => ArtifactType::ContainerImage,
        "filesystem" | "fs" | "directory" | "dir" | "file" => ArtifactType::Filesystem,
        "repository" | "repo" | "git" => ArtifactType::Repository,
        "vm_image" | "vm-image" | "vm" | "ami" | "ebs" => ArtifactType::VmImage,
        "rootfs" => ArtifactType::Rootfs,
        "sbom" | "cyclonedx" | "spdx" => ArtifactType::Sbom,
        _ => ArtifactType::Other,
    }
}
