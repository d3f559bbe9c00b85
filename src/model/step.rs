//! Decoding step instructions.

use serde::Deserialize;
use serde_json::Value;

use crate::extraction::json_path::JsonPath;
use crate::extraction::output_path::OutputPath;

/// The function a step applies, with its typed options.
#[derive(Debug, Clone)]
pub enum StepFunction {
    ParseQueryString,
    ParseJson,
    DecodeBase64,
    DecodeUrl,
    DecodeProtobuf,
    Gunzip,
    EnsureArray,
    GetProperty { path: JsonPath },
    DecodeJwt,
    Split { separator: String },
}

impl StepFunction {
    /// Name used in adapter definitions and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            StepFunction::ParseQueryString => "parseQueryString",
            StepFunction::ParseJson => "parseJson",
            StepFunction::DecodeBase64 => "decodeBase64",
            StepFunction::DecodeUrl => "decodeUrl",
            StepFunction::DecodeProtobuf => "decodeProtobuf",
            StepFunction::Gunzip => "gunzip",
            StepFunction::EnsureArray => "ensureArray",
            StepFunction::GetProperty { .. } => "getProperty",
            StepFunction::DecodeJwt => "decodeJwt",
            StepFunction::Split { .. } => "split",
        }
    }
}

/// Where a step reads its input from.
#[derive(Debug, Clone)]
pub enum StepInput {
    /// Feed the resolved value to the function once.
    Single(JsonPath),
    /// The path must resolve to an array; each non-null element is fed to
    /// the function separately.
    Map(JsonPath),
}

impl StepInput {
    pub fn path(&self) -> &JsonPath {
        match self {
            StepInput::Single(path) | StepInput::Map(path) => path,
        }
    }
}

/// One instruction in an adapter's pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct DecodingStep {
    pub function: StepFunction,
    pub input: StepInput,
    pub output: OutputPath,
}

impl DecodingStep {
    pub fn new(function: StepFunction, input: StepInput, output: OutputPath) -> Self {
        Self {
            function,
            input,
            output,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
enum StepName {
    ParseQueryString,
    ParseJson,
    DecodeBase64,
    DecodeUrl,
    DecodeProtobuf,
    Gunzip,
    EnsureArray,
    GetProperty,
    DecodeJwt,
    Split,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawStep {
    function: StepName,
    #[serde(default)]
    input: Option<JsonPath>,
    #[serde(default)]
    map_input: Option<JsonPath>,
    output: OutputPath,
    #[serde(default)]
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GetPropertyOptions {
    path: JsonPath,
}

#[derive(Debug, Deserialize)]
struct SplitOptions {
    separator: String,
}

fn options<T: for<'de> Deserialize<'de>>(name: &str, options: Option<Value>) -> Result<T, String> {
    let options = options.ok_or_else(|| format!("{name} requires options"))?;
    serde_json::from_value(options).map_err(|e| format!("invalid {name} options: {e}"))
}

impl TryFrom<RawStep> for DecodingStep {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let input = match (raw.input, raw.map_input) {
            (Some(path), None) => StepInput::Single(path),
            (None, Some(path)) => StepInput::Map(path),
            (Some(_), Some(_)) => {
                return Err("step sets both `input` and `mapInput`".to_string());
            }
            (None, None) => return Err("step sets neither `input` nor `mapInput`".to_string()),
        };

        let function = match raw.function {
            StepName::ParseQueryString => StepFunction::ParseQueryString,
            StepName::ParseJson => StepFunction::ParseJson,
            StepName::DecodeBase64 => StepFunction::DecodeBase64,
            StepName::DecodeUrl => StepFunction::DecodeUrl,
            StepName::DecodeProtobuf => StepFunction::DecodeProtobuf,
            StepName::Gunzip => StepFunction::Gunzip,
            StepName::EnsureArray => StepFunction::EnsureArray,
            StepName::DecodeJwt => StepFunction::DecodeJwt,
            StepName::GetProperty => {
                let opts: GetPropertyOptions = options("getProperty", raw.options)?;
                StepFunction::GetProperty { path: opts.path }
            }
            StepName::Split => {
                let opts: SplitOptions = options("split", raw.options)?;
                StepFunction::Split {
                    separator: opts.separator,
                }
            }
        };

        Ok(Self {
            function,
            input,
            output: raw.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_single_input() {
        let step: DecodingStep = serde_json::from_value(json!({
            "function": "parseJson",
            "input": "body",
            "output": "res.body"
        }))
        .unwrap();
        assert_eq!(step.function.name(), "parseJson");
        assert!(matches!(step.input, StepInput::Single(_)));
        assert_eq!(step.input.path().as_str(), "body");
        assert_eq!(step.output.as_str(), "res.body");
    }

    #[test]
    fn test_deserialize_map_input_with_options() {
        let step: DecodingStep = serde_json::from_value(json!({
            "function": "getProperty",
            "mapInput": "res.body.events",
            "options": {"path": "attributes.id"},
            "output": "res.body.ids"
        }))
        .unwrap();
        assert!(matches!(step.input, StepInput::Map(_)));
        assert_eq!(step.input.path().as_str(), "res.body.events");
        match step.function {
            StepFunction::GetProperty { path } => assert_eq!(path.as_str(), "attributes.id"),
            other => panic!("unexpected function {other:?}"),
        }
    }

    #[test]
    fn test_rejects_both_inputs() {
        let err = serde_json::from_value::<DecodingStep>(json!({
            "function": "parseJson",
            "input": "body",
            "mapInput": "body",
            "output": "res.body"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_rejects_missing_options() {
        assert!(serde_json::from_value::<DecodingStep>(json!({
            "function": "split",
            "input": "query",
            "output": "res.query"
        }))
        .is_err());
    }

    #[test]
    fn test_rejects_wildcard_output() {
        assert!(serde_json::from_value::<DecodingStep>(json!({
            "function": "parseJson",
            "input": "body",
            "output": "res.*"
        }))
        .is_err());
    }
}
