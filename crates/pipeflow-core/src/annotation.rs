//! `AnnotationParser` — converts a pipe's declared signature into
//! `PipeAnnotation` values (spec §4.1).
//!
//! Grammar: `Optional[F[S]]`, where `F` is one of the valid data format
//! classes and `S` is a dotted schema name, `Any`, or a single uppercase
//! generic label. Parsed once at pipe registration (§9 design note);
//! runtime dispatch looks up by `format_class`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::CoreError;
use crate::format::FormatClass;
use crate::schema::SchemaRef;

pub const SELF_REF_PARAM_NAME: &str = "this";
const CONTEXT_PARAM_NAME: &str = "context";

fn type_hint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<optional>Optional\[)?(?P<origin>\w+)(\[(?P<arg>(\w+\.)?\w+)\])?\]?$")
            .expect("static regex is valid")
    })
}

/// Parsed description of one parameter or return value.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeAnnotation {
    pub format_class: FormatClass,
    pub schema_ref: SchemaRef,
    pub name: Option<String>,
    pub is_variadic: bool,
    pub is_generic: bool,
    pub is_optional: bool,
    pub is_self_ref: bool,
    pub original_annotation: String,
}

impl PipeAnnotation {
    pub fn is_dataset(&self) -> bool {
        self.format_class == FormatClass::DataSet
    }

    /// Whether binding must find a block for this slot. The self-ref
    /// `this` slot is never required: a node's first invocation has no
    /// prior output to feed back (see DESIGN.md).
    pub fn is_required(&self) -> bool {
        !self.is_optional && !self.is_self_ref
    }
}

/// Raw description of one declared parameter, as a pipe registers it.
/// Mirrors `inspect.Parameter` in the source: a name, a textual type
/// annotation, whether it has a default value, and whether it's variadic.
#[derive(Debug, Clone)]
pub struct RawParameter {
    pub name: String,
    /// `None` for a bare `context` parameter with no type annotation, or
    /// for a return slot that is absent entirely (sink pipe — handled by
    /// the caller, not passed here).
    pub annotation: String,
    pub has_default: bool,
    pub is_variadic: bool,
}

impl RawParameter {
    pub fn new(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.into(),
            has_default: false,
            is_variadic: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }
}

/// The outcome of parsing one declared parameter.
pub enum ParsedParameter {
    /// A data-format-class parameter, e.g. `input: DataBlock[T1]`.
    Data(PipeAnnotation),
    /// The distinguished `context` parameter — sets `wants_context`.
    Context,
}

pub struct AnnotationParser;

impl AnnotationParser {
    /// Parse one declared parameter. Returns `ParsedParameter::Context`
    /// for the distinguished `context` slot; returns an error for any
    /// other name whose annotation isn't a valid data format class.
    pub fn parse_parameter(param: &RawParameter) -> Result<ParsedParameter, CoreError> {
        match Self::parse_type_annotation(&param.annotation) {
            Ok((format_class, schema_ref)) => {
                let is_self_ref = param.name == SELF_REF_PARAM_NAME;
                let is_generic = schema_ref.is_generic();
                Ok(ParsedParameter::Data(PipeAnnotation {
                    format_class,
                    schema_ref,
                    name: Some(param.name.clone()),
                    is_variadic: param.is_variadic,
                    is_generic,
                    is_optional: param.has_default,
                    is_self_ref,
                    original_annotation: param.annotation.clone(),
                }))
            }
            Err(_) if param.name == CONTEXT_PARAM_NAME => Ok(ParsedParameter::Context),
            Err(e) => Err(e),
        }
    }

    /// Parse a return annotation identically to an input slot (no name, no
    /// default, no variadic).
    pub fn parse_return(annotation: &str) -> Result<PipeAnnotation, CoreError> {
        let (format_class, schema_ref) = Self::parse_type_annotation(annotation)?;
        let is_generic = schema_ref.is_generic();
        Ok(PipeAnnotation {
            format_class,
            schema_ref,
            name: None,
            is_variadic: false,
            is_generic,
            is_optional: false,
            is_self_ref: false,
            original_annotation: annotation.to_string(),
        })
    }

    /// Parse an annotation of the form `Optional[F[S]]`.
    fn parse_type_annotation(annotation: &str) -> Result<(FormatClass, SchemaRef), CoreError> {
        let caps = type_hint_regex().captures(annotation).ok_or_else(|| {
            CoreError::InvalidSignature(format!("invalid pipe annotation '{annotation}'"))
        })?;
        let origin = caps
            .name("origin")
            .map(|m| m.as_str())
            .ok_or_else(|| {
                CoreError::InvalidSignature(format!("invalid pipe annotation '{annotation}'"))
            })?;
        let format_class = FormatClass::parse(origin).ok_or_else(|| {
            CoreError::InvalidSignature(format!("`{origin}` is not a valid data format class"))
        })?;
        let schema_ref = SchemaRef::parse(caps.name("arg").map(|m| m.as_str()));
        Ok((format_class, schema_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_data_block() {
        let p = RawParameter::new("input", "DataBlock[T1]");
        match AnnotationParser::parse_parameter(&p).unwrap() {
            ParsedParameter::Data(a) => {
                assert_eq!(a.format_class, FormatClass::DataBlock);
                assert_eq!(a.schema_ref, SchemaRef::Named("T1".to_string()));
                assert!(!a.is_optional);
                assert!(!a.is_generic);
            }
            ParsedParameter::Context => panic!("expected data annotation"),
        }
    }

    #[test]
    fn parses_optional_wrapper() {
        let p = RawParameter::new("input", "Optional[DataSet[T]]");
        match AnnotationParser::parse_parameter(&p).unwrap() {
            ParsedParameter::Data(a) => {
                assert_eq!(a.format_class, FormatClass::DataSet);
                assert!(a.is_generic);
                assert_eq!(a.schema_ref, SchemaRef::Generic('T'));
            }
            ParsedParameter::Context => panic!("expected data annotation"),
        }
    }

    #[test]
    fn default_value_marks_optional_regardless_of_wrapper() {
        let p = RawParameter::new("input", "DataBlock[T1]").optional();
        match AnnotationParser::parse_parameter(&p).unwrap() {
            ParsedParameter::Data(a) => assert!(a.is_optional),
            ParsedParameter::Context => panic!("expected data annotation"),
        }
    }

    #[test]
    fn this_param_is_self_ref() {
        let p = RawParameter::new("this", "DataBlock[T]");
        match AnnotationParser::parse_parameter(&p).unwrap() {
            ParsedParameter::Data(a) => assert!(a.is_self_ref),
            ParsedParameter::Context => panic!("expected data annotation"),
        }
    }

    #[test]
    fn context_param_recognized() {
        let p = RawParameter::new("context", "PipeContext");
        assert!(matches!(
            AnnotationParser::parse_parameter(&p).unwrap(),
            ParsedParameter::Context
        ));
    }

    #[test]
    fn unrecognized_format_class_rejected() {
        let p = RawParameter::new("weird", "Frobnicator[T]");
        assert!(AnnotationParser::parse_parameter(&p).is_err());
    }

    #[test]
    fn missing_schema_defaults_to_any() {
        let p = RawParameter::new("input", "DataBlock");
        match AnnotationParser::parse_parameter(&p).unwrap() {
            ParsedParameter::Data(a) => assert_eq!(a.schema_ref, SchemaRef::Any),
            ParsedParameter::Context => panic!("expected data annotation"),
        }
    }
}
