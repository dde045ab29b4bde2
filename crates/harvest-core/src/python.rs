//! Python extension module `harvest_core`.

use std::path::Path;

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use pyo3::wrap_pyfunction;

use crate::clean::filter::{has_body_code, MethodFilter};
use crate::collect::local::LocalCheckouts;
use crate::config::{HarvestConfig, DEFAULT_MAX_LINES, DEFAULT_MIN_LINES};
use crate::extract::methods::{self, ExtractOptions};
use crate::extract::parser::CallableKind;
use crate::extract::tokenizer::tokenize;
use crate::models::{CandidateRecord, HarvestStats, MethodRecord};
use crate::pipeline::Harvester;
use crate::store::{CsvSink, MultiSink, RowSink, SqliteSink};

fn candidate_to_dict<'py>(py: Python<'py>, c: &CandidateRecord) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("method_name", &c.method_name)?;
    dict.set_item("kind", c.kind.as_str())?;
    dict.set_item("start_line", c.start_line)?;
    dict.set_item("end_line", c.end_line)?;
    dict.set_item("signature", &c.signature)?;
    dict.set_item("original_code", &c.original_code)?;
    dict.set_item("code_tokens", &c.code_tokens)?;
    dict.set_item("body_has_code", c.body_has_code)?;
    dict.set_item("well_formed", c.well_formed)?;
    Ok(dict)
}

fn stats_to_dict<'py>(py: Python<'py>, stats: &HarvestStats) -> PyResult<Bound<'py, PyDict>> {
    let rejected = PyDict::new(py);
    rejected.set_item("too_short", stats.rejected.too_short)?;
    rejected.set_item("too_long", stats.rejected.too_long)?;
    rejected.set_item("empty_body", stats.rejected.empty_body)?;
    rejected.set_item("unparsed", stats.rejected.unparsed)?;

    let dict = PyDict::new(py);
    dict.set_item("repositories_seen", stats.repositories_seen)?;
    dict.set_item("repositories_failed", stats.repositories_failed)?;
    dict.set_item(
        "repositories_skipped_license",
        stats.repositories_skipped_license,
    )?;
    dict.set_item("files_seen", stats.files_seen)?;
    dict.set_item("files_parsed", stats.files_parsed)?;
    dict.set_item("files_failed_parse", stats.files_failed_parse)?;
    dict.set_item("files_failed_encoding", stats.files_failed_encoding)?;
    dict.set_item("files_without_data", stats.files_without_data)?;
    dict.set_item("candidates", stats.candidates)?;
    dict.set_item("malformed", stats.malformed)?;
    dict.set_item("rejected", rejected)?;
    dict.set_item("duplicates", stats.duplicates)?;
    dict.set_item("rows_written", stats.rows_written)?;
    dict.set_item("sample_cap_reached", stats.sample_cap_reached)?;
    dict.set_item("elapsed_ms", stats.elapsed_ms)?;
    Ok(dict)
}

/// Token texts of a code fragment.
#[pyfunction]
fn tokenize_code(code: &str) -> Vec<String> {
    tokenize(code).map(|t| t.text.to_string()).collect()
}

/// `(kind, text)` pairs of a code fragment.
#[pyfunction]
fn tokenize_with_kinds(code: &str) -> Vec<(&'static str, String)> {
    tokenize(code)
        .map(|t| (t.kind.as_str(), t.text.to_string()))
        .collect()
}

/// Candidate methods of one Java source as a list of dicts. With
/// `accepted_only`, the default cleaning rules are applied.
#[pyfunction]
#[pyo3(signature = (source, path="<memory>", include_constructors=false, accepted_only=false))]
fn extract_methods(
    py: Python<'_>,
    source: &str,
    path: &str,
    include_constructors: bool,
    accepted_only: bool,
) -> PyResult<PyObject> {
    let options = ExtractOptions {
        include_constructors,
    };
    let candidates = methods::extract_methods(source, path, options)?;
    let filter = MethodFilter::default();
    let list = PyList::empty(py);
    for candidate in candidates
        .iter()
        .filter(|c| !accepted_only || filter.accept(c))
    {
        list.append(candidate_to_dict(py, candidate)?)?;
    }
    Ok(list.into())
}

/// Whether a method passes the cleaning rules. `start_line` is 1-based;
/// the span ends where `code` does.
#[pyfunction]
#[pyo3(signature = (code, start_line=1, min_lines=DEFAULT_MIN_LINES, max_lines=DEFAULT_MAX_LINES))]
fn accept_method(code: &str, start_line: usize, min_lines: usize, max_lines: usize) -> bool {
    let line_count = code.lines().count().max(1);
    let candidate = CandidateRecord {
        method_name: String::new(),
        kind: CallableKind::Method,
        start_line,
        end_line: start_line + line_count - 1,
        signature: String::new(),
        original_code: code.to_string(),
        code_tokens: Vec::new(),
        body_has_code: has_body_code(code),
        well_formed: true,
    };
    MethodFilter {
        min_lines,
        max_lines,
        ..MethodFilter::default()
    }
    .accept(&candidate)
}

/// Run the pipeline over a local-checkout manifest and return run counters.
#[pyfunction]
#[pyo3(signature = (manifest, output_csv, sqlite=None, config=None))]
fn harvest_manifest(
    py: Python<'_>,
    manifest: &str,
    output_csv: &str,
    sqlite: Option<&str>,
    config: Option<&str>,
) -> PyResult<PyObject> {
    let config = HarvestConfig::load(config.map(Path::new))?;
    let stats = py.allow_threads(|| -> crate::errors::HarvestResult<HarvestStats> {
        let source = LocalCheckouts::from_manifest(Path::new(manifest), &config)?;
        let mut sink = MultiSink::new();
        sink.push(Box::new(CsvSink::create(Path::new(output_csv))?));
        if let Some(db) = sqlite {
            sink.push(Box::new(SqliteSink::create(Path::new(db), config.dedup_key)?));
        }
        let harvester = Harvester::new(config.clone())?;
        harvester.run(&source, &source, &mut sink as &mut dyn RowSink)
    })?;
    Ok(stats_to_dict(py, &stats)?.into())
}

#[pymodule]
fn harvest_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<MethodRecord>()?;
    m.add("DEFAULT_MIN_LINES", DEFAULT_MIN_LINES)?;
    m.add("DEFAULT_MAX_LINES", DEFAULT_MAX_LINES)?;
    m.add_function(wrap_pyfunction!(tokenize_code, m)?)?;
    m.add_function(wrap_pyfunction!(tokenize_with_kinds, m)?)?;
    m.add_function(wrap_pyfunction!(extract_methods, m)?)?;
    m.add_function(wrap_pyfunction!(accept_method, m)?)?;
    m.add_function(wrap_pyfunction!(harvest_manifest, m)?)?;
    Ok(())
}
