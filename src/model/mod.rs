//! Canonical intermediate representation for scanner output.
//!
//! Every supported raw format (Trivy JSON, Trivy SARIF, Grype, Snyk) is
//! normalized into these structures before any policy or risk logic runs.
//! The enumerations are closed and the mapping tables total: unrecognized
//! scanner vocabulary degrades to explicit `Unknown`/`Other` variants
//! instead of failing.

mod finding;
mod scan;
mod severity;

pub use finding::*;
pub use scan::*;
pub use severity::*;
