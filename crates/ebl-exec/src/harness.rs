//! Trace comparator
//!
//! Runs each labeled case through both executors on independent copies of
//! its initial state and checks the verdict and both final states against
//! what the fixture pins down.
//!
//! # Core Concepts
//!
//! - **Case fixture**: initial state, raw bundle, expected outcome
//! - **Case result**: verdict plus naive and gated final states, with match flags
//! - **Report**: ordered results, pass/fail, text and JSON renderings

use crate::error::{ExecutionError, HarnessError};
use crate::gated::GatedExecutor;
use crate::naive::NaiveExecutor;
use crate::trace::TraceEvent;
use ebl_bundle::{ActionBundle, GatePolicy};
use ebl_gate::{AdmissibilityGate, Category, Finding, Verdict};
use ebl_state::ResourceState;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome a case expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    /// Gate verdict
    pub verdict: Verdict,
    /// Finding categories, in order
    #[serde(default)]
    pub categories: Vec<Category>,
    /// State after the naive executor
    pub naive_state: ResourceState,
    /// State after the gated executor
    pub gated_state: ResourceState,
}

/// One labeled case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFixture {
    /// Case name
    pub name: String,
    /// What the case exercises
    #[serde(default)]
    pub description: String,
    /// Contamination category the case targets (none for clean cases)
    #[serde(default)]
    pub category: Option<Category>,
    /// State both executors start from
    #[serde(default)]
    pub initial_state: ResourceState,
    /// Raw bundle document
    pub bundle: Value,
    /// Expected outcome
    pub expected: ExpectedOutcome,
}

impl CaseFixture {
    /// Load one case file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| HarnessError::io_error(path, e))?;
        serde_json::from_str(&text).map_err(|source| HarnessError::Fixture {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load every `*.json` case in a directory, sorted by file name
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Self>, HarnessError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| HarnessError::io_error(dir, e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        paths.iter().map(Self::load).collect()
    }

    /// Validated bundle
    pub fn bundle(&self) -> Result<ActionBundle, HarnessError> {
        ActionBundle::from_value(self.bundle.clone()).map_err(|source| HarnessError::Bundle {
            case: self.name.clone(),
            source,
        })
    }
}

/// What both paths did with one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    /// Case name
    pub name: String,
    /// Targeted category
    pub category: Option<Category>,
    /// Verdict the gate returned
    pub verdict: Verdict,
    /// Verdict the case expects
    pub expected_verdict: Verdict,
    /// Findings behind the verdict
    pub findings: Vec<Finding>,
    /// Naive final state
    pub naive_state: ResourceState,
    /// Gated final state
    pub gated_state: ResourceState,
    /// Verdict as expected
    pub verdict_matches: bool,
    /// Finding categories as expected
    pub categories_match: bool,
    /// Naive final state as expected
    pub naive_matches: bool,
    /// Gated final state as expected
    pub gated_matches: bool,
    /// Naive path changed the initial state
    pub naive_diverged: bool,
    /// Gated path left the initial state bit-for-bit intact
    pub gated_unchanged: bool,
    /// Naive trace
    pub naive_trace: Vec<TraceEvent>,
    /// Gated trace
    pub gated_trace: Vec<TraceEvent>,
}

impl CaseResult {
    /// Whether every expectation held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict_matches && self.categories_match && self.naive_matches && self.gated_matches
    }

    fn mismatches(&self) -> Vec<&'static str> {
        [
            (self.verdict_matches, "verdict"),
            (self.categories_match, "categories"),
            (self.naive_matches, "naive state"),
            (self.gated_matches, "gated state"),
        ]
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, what)| what)
        .collect()
    }
}

/// Results for a corpus, in case order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparatorReport {
    /// Per-case results
    pub results: Vec<CaseResult>,
}

impl ComparatorReport {
    /// Whether every case passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(CaseResult::passed)
    }

    /// Cases that failed
    #[must_use]
    pub fn failures(&self) -> Vec<&CaseResult> {
        self.results.iter().filter(|r| !r.passed()).collect()
    }

    /// Result for a named case
    #[must_use]
    pub fn case(&self, name: &str) -> Option<&CaseResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== EBL Trace Comparator Report ===\n\n");
        let _ = writeln!(report, "Cases: {}", self.results.len());
        let _ = writeln!(report, "Passed: {}", self.results.len() - self.failures().len());
        let _ = writeln!(report, "Failed: {}", self.failures().len());

        report.push_str("\n=== Cases ===\n");
        for r in &self.results {
            let _ = writeln!(
                report,
                "[{}] {} ({}): verdict {} (expected {}), naive {}, gated {}",
                if r.passed() { "PASS" } else { "FAIL" },
                r.name,
                r.category.map_or("clean", Category::as_str),
                r.verdict,
                r.expected_verdict,
                if r.naive_diverged { "diverged" } else { "unchanged" },
                if r.gated_unchanged { "unchanged" } else { "mutated" },
            );
            for f in &r.findings {
                let _ = writeln!(report, "    {f}");
            }
            let mismatches = r.mismatches();
            if !mismatches.is_empty() {
                let _ = writeln!(report, "    mismatch: {}", mismatches.join(", "));
            }
        }

        let _ = write!(
            report,
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs cases through both executors and compares against expectations
#[derive(Debug, Clone, Default)]
pub struct TraceComparator {
    policy: Arc<GatePolicy>,
}

impl TraceComparator {
    /// Create comparator over the default policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific policy for both paths
    #[must_use]
    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Run one case
    pub fn compare(&self, case: &CaseFixture) -> Result<CaseResult, HarnessError> {
        let bundle = case.bundle()?;
        let execution = |source: ExecutionError| HarnessError::Execution {
            case: case.name.clone(),
            source,
        };

        let naive = NaiveExecutor::new(Arc::clone(&self.policy));
        let mut naive_state = case.initial_state.clone();
        naive.execute(&bundle, &mut naive_state).map_err(execution)?;

        let gated = GatedExecutor::new(
            AdmissibilityGate::new(Arc::clone(&self.policy)),
            Arc::clone(&self.policy),
        );
        let mut gated_state = case.initial_state.clone();
        let outcome = gated.execute(&bundle, &mut gated_state).map_err(execution)?;
        let decision = outcome.decision();

        let expected = &case.expected;
        let initial_digest = case.initial_state.digest();
        let result = CaseResult {
            name: case.name.clone(),
            category: case.category,
            verdict: decision.verdict(),
            expected_verdict: expected.verdict,
            findings: decision.findings().to_vec(),
            verdict_matches: decision.verdict() == expected.verdict,
            categories_match: decision.categories() == expected.categories,
            naive_matches: naive_state == expected.naive_state,
            gated_matches: gated_state == expected.gated_state,
            naive_diverged: naive_state.digest() != initial_digest,
            gated_unchanged: gated_state.digest() == initial_digest,
            naive_state,
            gated_state,
            naive_trace: naive.trace().events(),
            gated_trace: gated.trace().events(),
        };

        tracing::info!(
            case = %result.name,
            verdict = %result.verdict,
            passed = result.passed(),
            "case compared"
        );
        Ok(result)
    }

    /// Run a corpus in parallel; results keep case order
    pub fn run_corpus(&self, cases: &[CaseFixture]) -> Result<ComparatorReport, HarnessError> {
        let results = cases
            .par_iter()
            .map(|case| self.compare(case))
            .collect::<Result<Vec<_>, _>>()?;

        let report = ComparatorReport { results };
        tracing::info!(
            cases = report.results.len(),
            failed = report.failures().len(),
            "corpus compared"
        );
        Ok(report)
    }

    /// Load and run every case in a directory
    pub fn run_dir(&self, dir: impl AsRef<Path>) -> Result<ComparatorReport, HarnessError> {
        let cases = CaseFixture::load_dir(dir)?;
        self.run_corpus(&cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebl_test_utils::{fs_state, BundleBuilder};
    use serde_json::json;

    fn clean_case() -> CaseFixture {
        let bundle = BundleBuilder::write("/data/new.json", json!("v1"))
            .permissions(&["write"])
            .to_value();
        let after = fs_state(&[("/data/new.json", json!("v1"))]);
        CaseFixture {
            name: "clean".into(),
            description: String::new(),
            category: None,
            initial_state: ResourceState::new(),
            bundle,
            expected: ExpectedOutcome {
                verdict: Verdict::Allow,
                categories: Vec::new(),
                naive_state: after.clone(),
                gated_state: after,
            },
        }
    }

    #[test]
    fn clean_case_passes() {
        let result = TraceComparator::new().compare(&clean_case()).unwrap();
        assert!(result.passed());
        assert!(result.naive_diverged);
        assert!(!result.gated_unchanged);
    }

    #[test]
    fn wrong_expectation_is_reported() {
        let mut case = clean_case();
        case.expected.verdict = Verdict::Deny;
        let report = TraceComparator::new().run_corpus(&[case]).unwrap();

        assert!(!report.passed());
        let text = report.generate_text();
        assert!(text.contains("[FAIL] clean (clean)"));
        assert!(text.contains("mismatch: verdict"));
        assert!(text.ends_with("=== Result: FAIL ===\n"));
    }

    #[test]
    fn malformed_bundle_is_a_harness_error() {
        let mut case = clean_case();
        case.bundle = json!({"operation_type": "write"});
        let err = TraceComparator::new().compare(&case).unwrap_err();
        assert!(matches!(err, HarnessError::Bundle { .. }));
    }

    #[test]
    fn report_serialises() {
        let report = TraceComparator::new().run_corpus(&[clean_case()]).unwrap();
        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["results"][0]["verdict"], "ALLOW");
    }
}
