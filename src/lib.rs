//! TrackHAR Core - Adapter-driven extraction of tracking data
//!
//! This crate turns captured HTTP requests made by tracking SDKs into
//! labelled data values, optionally exposed to Python via PyO3 (feature
//! `python`). The implementation prioritizes:
//!
//! 1. **Determinism** - Catalog order decides matching, steps run in order
//! 2. **Logging** - Every decision point logged with request context
//! 3. **Performance** - Compiled paths and patterns, parallel batches
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Step library, decoding engine and request orchestration
//! - `protobuf` - Schema-less protobuf wire decoding
//! - `extraction` - Read/write path languages and data path extraction
//! - `routing` - Adapter matching and indicator fallback
//! - `validation` - Adapter catalog loading and the process-wide catalog
//! - `model` - Requests, trackers, adapters and matches
//! - `har` - HAR 1.2 ingestion
//! - `logging` - Structured logging with request context
//!
//! ## Example
//!
//! ```
//! use trackhar_core::pipeline::{process_request, ProcessOptions};
//! use trackhar_core::model::Request;
//! use trackhar_core::validation::AdapterCatalog;
//!
//! let catalog = AdapterCatalog::from_json(r#"{"trackers": [{"slug": "t", "name": "T", "adapters": [{
//!     "slug": "a",
//!     "endpointUrls": ["https://example.com/track"],
//!     "decodingSteps": [{"function": "parseJson", "input": "body", "output": "res.body"}],
//!     "containedDataPaths": {
//!         "otherIdentifiers": {"context": "body", "path": "device_id", "reasoning": "obvious property name"}
//!     }
//! }]}]}"#).unwrap();
//!
//! let request = Request::new("https://example.com/track").with_content(r#"{"device_id":"abc123"}"#);
//! let matches = process_request(&request, catalog.adapters(), &ProcessOptions::default())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(matches[0].value, "abc123");
//! ```

pub mod binary;
pub mod error;
pub mod extraction;
pub mod har;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod protobuf;
pub mod routing;
pub mod validation;

/// Initialize the logger. Level comes from `RUST_LOG`, defaulting to info.
/// Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(feature = "python")]
mod python {
    use std::collections::HashMap;

    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;
    use pyo3::types::{PyDict, PyList};
    use serde_json::Value;

    use crate::har::parse_har;
    use crate::init_logger;
    use crate::model::Property;
    use crate::pipeline::ingestion::{process_batch, ProcessOptions};
    use crate::routing::indicators::IndicatorValues;
    use crate::validation::catalog;

    fn json_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
        Ok(match value {
            Value::Null => py.None(),
            Value::Bool(b) => b.to_object(py),
            Value::Number(n) => match (n.as_u64(), n.as_i64()) {
                (Some(u), _) => u.to_object(py),
                (None, Some(i)) => i.to_object(py),
                _ => n.as_f64().unwrap_or(f64::NAN).to_object(py),
            },
            Value::String(s) => s.to_object(py),
            Value::Array(items) => {
                let list = PyList::empty(py);
                for item in items {
                    list.append(json_to_py(py, item)?)?;
                }
                list.to_object(py)
            }
            Value::Object(map) => {
                let dict = PyDict::new(py);
                for (key, item) in map {
                    dict.set_item(key, json_to_py(py, item)?)?;
                }
                dict.to_object(py)
            }
        })
    }

    /// Load adapter definitions (a catalog JSON document) into the cache.
    ///
    /// Adapters are appended after those already loaded. Returns the number
    /// added.
    #[pyfunction]
    fn load_adapters(catalog_json: String) -> PyResult<usize> {
        init_logger();
        catalog::load_catalog_json(&catalog_json).map_err(|e| {
            log::warn!("CATALOG_LOAD_FAILED error={}", e);
            PyValueError::new_err(e.to_string())
        })
    }

    /// Clear the adapter cache.
    #[pyfunction]
    fn clear_adapters() -> PyResult<()> {
        init_logger();
        catalog::clear_catalog();
        Ok(())
    }

    /// Ids of the loaded adapters, in matching order.
    #[pyfunction]
    fn get_loaded_adapters() -> PyResult<Vec<String>> {
        Ok(catalog::loaded_adapter_ids())
    }

    /// Process every request in a HAR capture.
    ///
    /// # Arguments
    /// * `har_json` - The HAR document
    /// * `indicator_values` - Optional `{property: [value, ...]}` searched for
    ///   in requests no adapter handles
    ///
    /// # Returns
    /// Batch dict with counts and one result dict per HAR entry
    #[pyfunction]
    #[pyo3(signature = (har_json, indicator_values=None))]
    fn process_har(
        py: Python<'_>,
        har_json: String,
        indicator_values: Option<HashMap<String, Vec<String>>>,
    ) -> PyResult<Py<PyAny>> {
        init_logger();

        let requests = parse_har(&har_json).map_err(|e| PyValueError::new_err(e.to_string()))?;

        let indicator_values = indicator_values
            .map(|values| {
                values
                    .into_iter()
                    .map(|(property, values)| {
                        property
                            .parse::<Property>()
                            .map(|property| (property, values))
                            .map_err(PyValueError::new_err)
                    })
                    .collect::<PyResult<IndicatorValues>>()
            })
            .transpose()?;
        let options = ProcessOptions { indicator_values };

        log::info!("HAR_RECEIVED requests={}", requests.len());

        let result = {
            let cache = catalog::get_catalog();
            process_batch(&requests, cache.adapters(), &options)
        };

        let py_result = PyDict::new(py);
        py_result.set_item("batch_id", &result.batch_id)?;
        py_result.set_item("received_count", result.received_count)?;
        py_result.set_item("matched_count", result.matched_count)?;
        py_result.set_item("unmatched_count", result.unmatched_count)?;
        py_result.set_item("failed_count", result.failed_count)?;

        let requests_list = PyList::empty(py);
        for (request, outcome) in requests.iter().zip(&result.requests) {
            let request_dict = PyDict::new(py);
            request_dict.set_item("request_id", &outcome.request_id)?;
            request_dict.set_item("endpoint_url", &request.endpoint_url)?;
            request_dict.set_item("adapter", &outcome.adapter)?;

            if let Some(error) = &outcome.error {
                request_dict.set_item("error", error)?;
            }

            match &outcome.matches {
                Some(matches) => {
                    let matches_list = PyList::empty(py);
                    for m in matches {
                        let match_dict = PyDict::new(py);
                        match_dict.set_item("adapter", &m.adapter)?;
                        match_dict.set_item("property", m.property.as_str())?;
                        match_dict.set_item("context", m.context.as_str())?;
                        match_dict.set_item("path", &m.path)?;
                        match_dict.set_item("reasoning", &m.reasoning)?;
                        match_dict.set_item("value", json_to_py(py, &m.value)?)?;
                        matches_list.append(match_dict)?;
                    }
                    request_dict.set_item("matches", matches_list)?;
                }
                None => request_dict.set_item("matches", py.None())?,
            }

            requests_list.append(request_dict)?;
        }
        py_result.set_item("requests", requests_list)?;

        Ok(py_result.into())
    }

    /// Python module definition
    #[pymodule]
    fn trackhar_core(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(load_adapters, m)?)?;
        m.add_function(wrap_pyfunction!(clear_adapters, m)?)?;
        m.add_function(wrap_pyfunction!(get_loaded_adapters, m)?)?;
        m.add_function(wrap_pyfunction!(process_har, m)?)?;
        Ok(())
    }
}
