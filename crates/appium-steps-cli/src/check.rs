//! `check`: resolve the step lines of `.feature` files against the built-in
//! registry without a device session.
//!
//! Feature files are parsed with `gherkin`. Background and scenario steps are
//! checked as written; `Scenario Outline` steps are checked once per
//! `Examples` row with the row's values substituted.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gherkin::{Feature, GherkinEnv, Scenario, Step};
use serde_json::json;

use appium_steps_core::registry::{ResolveError, StepRegistry};

/// A step taken from a feature file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureStep {
    /// 1-based line of the step.
    pub line: usize,
    /// Step text without its keyword, outline parameters substituted.
    pub text: String,
    /// 1-based data row, across all `Examples` tables of the outline.
    pub example_row: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Undefined,
    Ambiguous,
    Coercion,
    Other,
}

impl FailureKind {
    fn as_str(self) -> &'static str {
        match self {
            FailureKind::Undefined => "undefined",
            FailureKind::Ambiguous => "ambiguous",
            FailureKind::Coercion => "coercion",
            FailureKind::Other => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub file: PathBuf,
    pub step: FeatureStep,
    pub kind: FailureKind,
    pub message: String,
}

/// A file that is not valid Gherkin.
#[derive(Debug, Clone)]
pub struct InvalidFile {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub files: usize,
    pub steps: usize,
    pub failures: Vec<CheckFailure>,
    pub invalid_files: Vec<InvalidFile>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.invalid_files.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let failures: Vec<_> = self
            .failures
            .iter()
            .map(|f| {
                json!({
                    "file": f.file.display().to_string(),
                    "line": f.step.line,
                    "exampleRow": f.step.example_row,
                    "step": f.step.text,
                    "kind": f.kind.as_str(),
                    "message": f.message,
                })
            })
            .collect();
        let invalid: Vec<_> = self
            .invalid_files
            .iter()
            .map(|f| json!({ "file": f.file.display().to_string(), "message": f.message }))
            .collect();
        json!({
            "files": self.files,
            "steps": self.steps,
            "failures": failures,
            "invalidFiles": invalid,
        })
    }

    pub fn print_text(&self) {
        for invalid in &self.invalid_files {
            println!("{}: invalid feature file: {}", invalid.file.display(), invalid.message);
        }
        for failure in &self.failures {
            let row = match failure.step.example_row {
                Some(row) => format!(" (example row {})", row),
                None => String::new(),
            };
            println!(
                "{}:{}{}: {}: {}",
                failure.file.display(),
                failure.step.line,
                row,
                failure.kind.as_str(),
                failure.message
            );
        }
        println!(
            "Checked {} step(s) in {} file(s), {} unresolved",
            self.steps,
            self.files,
            self.failures.len()
        );
    }
}

/// Expands files, directories (searched for `*.feature`) and glob patterns
/// into a sorted, de-duplicated file list. A pattern matching nothing is an
/// error.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut files = BTreeSet::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.insert(path.to_path_buf());
            continue;
        }
        let glob_pattern = if path.is_dir() {
            path.join("**").join("*.feature").to_string_lossy().into_owned()
        } else {
            pattern.clone()
        };
        let matches: Vec<PathBuf> = glob::glob(&glob_pattern)
            .map_err(|e| format!("Invalid pattern '{}': {}", pattern, e))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            return Err(format!("No feature files match '{}'", pattern));
        }
        files.extend(matches);
    }
    Ok(files.into_iter().collect())
}

pub fn check_files(registry: &StepRegistry, files: &[PathBuf]) -> io::Result<CheckReport> {
    let mut report = CheckReport::default();
    for file in files {
        let source = fs::read_to_string(file)?;
        report.files += 1;
        let steps = match parse_steps(&source) {
            Ok(steps) => steps,
            Err(message) => {
                tracing::debug!(file = %file.display(), %message, "not valid gherkin");
                report.invalid_files.push(InvalidFile {
                    file: file.clone(),
                    message,
                });
                continue;
            }
        };
        tracing::debug!(file = %file.display(), steps = steps.len(), "checking");
        report.steps += steps.len();
        for step in steps {
            if let Err(e) = registry.resolve(&step.text) {
                let kind = match e {
                    ResolveError::NoMatch { .. } => FailureKind::Undefined,
                    ResolveError::AmbiguousMatch { .. } => FailureKind::Ambiguous,
                    ResolveError::ArgumentCoercion { .. } => FailureKind::Coercion,
                    ResolveError::NotSealed => FailureKind::Other,
                };
                report.failures.push(CheckFailure {
                    file: file.clone(),
                    step,
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

/// Every step of a feature, in background, scenario, rule order.
pub fn parse_steps(source: &str) -> Result<Vec<FeatureStep>, String> {
    let feature = Feature::parse(source, GherkinEnv::default()).map_err(|e| e.to_string())?;

    let mut steps = Vec::new();
    if let Some(background) = &feature.background {
        push_as_written(&background.steps, &mut steps);
    }
    for scenario in &feature.scenarios {
        push_scenario(scenario, &mut steps);
    }
    for rule in &feature.rules {
        if let Some(background) = &rule.background {
            push_as_written(&background.steps, &mut steps);
        }
        for scenario in &rule.scenarios {
            push_scenario(scenario, &mut steps);
        }
    }
    Ok(steps)
}

fn push_as_written(steps: &[Step], out: &mut Vec<FeatureStep>) {
    out.extend(steps.iter().map(|step| FeatureStep {
        line: step.position.line,
        text: step.value.clone(),
        example_row: None,
    }));
}

/// Outline steps are expanded per example row; an outline without example
/// rows is checked as written.
fn push_scenario(scenario: &Scenario, out: &mut Vec<FeatureStep>) {
    let mut row_number = 0;
    for table in scenario.examples.iter().filter_map(|e| e.table.as_ref()) {
        let Some((headers, rows)) = table.rows.split_first() else {
            continue;
        };
        for row in rows {
            row_number += 1;
            for step in &scenario.steps {
                let mut text = step.value.clone();
                for (header, cell) in headers.iter().zip(row) {
                    text = text.replace(&format!("<{}>", header), cell);
                }
                out.push(FeatureStep {
                    line: step.position.line,
                    text,
                    example_row: Some(row_number),
                });
            }
        }
    }
    if row_number == 0 {
        push_as_written(&scenario.steps, out);
    }
}
