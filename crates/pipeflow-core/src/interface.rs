//! `PipeInterface` — the parsed signature of one pipe (spec §3, §4.1).

use std::collections::HashMap;

use crate::annotation::{AnnotationParser, ParsedParameter, PipeAnnotation, RawParameter, SELF_REF_PARAM_NAME};
use crate::error::{CoreError, CoreResult};
use crate::format::FormatClass;

/// `{inputs: [PipeAnnotation], output: PipeAnnotation?, wants_context: bool}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeInterface {
    pub inputs: Vec<PipeAnnotation>,
    pub output: Option<PipeAnnotation>,
    pub wants_context: bool,
}

impl PipeInterface {
    /// Parse a pipe's declared parameters and return annotation into a
    /// validated `PipeInterface`. Mirrors
    /// `DataFunctionInterface.from_data_function_definition`: gathered once
    /// at pipe registration (§9).
    pub fn from_signature(
        params: &[RawParameter],
        return_annotation: Option<&str>,
    ) -> CoreResult<Self> {
        let mut inputs = Vec::with_capacity(params.len());
        let mut wants_context = false;
        for param in params {
            match AnnotationParser::parse_parameter(param)? {
                ParsedParameter::Data(a) => inputs.push(a),
                ParsedParameter::Context => wants_context = true,
            }
        }
        let output = return_annotation.map(AnnotationParser::parse_return).transpose()?;
        let interface = PipeInterface {
            inputs,
            output,
            wants_context,
        };
        interface.validate_inputs()?;
        Ok(interface)
    }

    pub fn get_input(&self, name: &str) -> Option<&PipeAnnotation> {
        self.inputs.iter().find(|a| a.name.as_deref() == Some(name))
    }

    /// All declared slots except `this` — the self-ref slot is connected
    /// implicitly by the interface manager, never by the caller's raw input
    /// map (mirrors `get_non_recursive_inputs`).
    pub fn non_self_ref_inputs(&self) -> impl Iterator<Item = &PipeAnnotation> {
        self.inputs.iter().filter(|a| !a.is_self_ref)
    }

    pub fn inputs_by_name(&self) -> HashMap<&str, &PipeAnnotation> {
        self.inputs
            .iter()
            .filter_map(|a| a.name.as_deref().map(|n| (n, a)))
            .collect()
    }

    /// Reject interfaces with more than one non-optional `DataBlock` slot
    /// (invariant 2). Correlate multiple DataBlock inputs via a `DataSet`
    /// instead.
    ///
    /// The self-ref `this` slot is excluded from this count: it is a
    /// deliberate, distinguished cycle back to the node's own prior
    /// output (§9 design note), not a second competing uncorrelated
    /// stream, and is always optional in practice (there is nothing to
    /// bind on a node's first invocation). See DESIGN.md for this
    /// decision.
    fn validate_inputs(&self) -> CoreResult<()> {
        let mut data_block_seen = false;
        for annotation in &self.inputs {
            if annotation.is_self_ref {
                continue;
            }
            if annotation.format_class == FormatClass::DataBlock && !annotation.is_optional {
                if data_block_seen {
                    return Err(CoreError::InvalidSignature(
                        "only one uncorrelated DataBlock input allowed per pipe; \
                         correlate the inputs or use a DataSet"
                            .to_string(),
                    ));
                }
                data_block_seen = true;
            }
        }
        Ok(())
    }

    /// Resolve a pipe's raw declared inputs (§4.2 `assign_inputs`) to a
    /// name-keyed map. A single bare value is accepted only when the pipe
    /// has exactly one non-self-ref slot; otherwise the caller must supply
    /// a map whose keys (minus `this`) exactly match the non-self-ref slot
    /// names.
    pub fn assign_inputs<T: Clone>(
        &self,
        raw: RawInputs<T>,
    ) -> CoreResult<HashMap<String, T>> {
        match raw {
            RawInputs::Single(v) => {
                let non_self_ref: Vec<&PipeAnnotation> = self.non_self_ref_inputs().collect();
                if non_self_ref.len() != 1 {
                    return Err(CoreError::InvalidInputAssignment(format!(
                        "expected a name-keyed input map ({} non-self-ref slots), got a single value",
                        non_self_ref.len()
                    )));
                }
                let name = non_self_ref[0]
                    .name
                    .clone()
                    .expect("non-self-ref slots are always named");
                let mut map = HashMap::new();
                map.insert(name, v);
                Ok(map)
            }
            RawInputs::Named(map) => {
                let declared: std::collections::HashSet<&str> = self
                    .non_self_ref_inputs()
                    .filter_map(|a| a.name.as_deref())
                    .collect();
                let given: std::collections::HashSet<&str> = map
                    .keys()
                    .map(|s| s.as_str())
                    .filter(|k| *k != SELF_REF_PARAM_NAME)
                    .collect();
                if given != declared {
                    return Err(CoreError::InvalidInputAssignment(format!(
                        "declared input names {given:?} do not match pipe slot names {declared:?}"
                    )));
                }
                Ok(map)
            }
        }
    }
}

/// Raw declared-inputs shape a node constructor accepts, mirroring
/// `RawNodeInputs` in the source: either a single upstream (valid only for
/// single-non-self-ref-slot pipes) or a name-keyed map.
pub enum RawInputs<T> {
    Single(T),
    Named(HashMap<String, T>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(params: &[(&str, &str)], ret: Option<&str>) -> CoreResult<PipeInterface> {
        let raw: Vec<RawParameter> = params
            .iter()
            .map(|(n, a)| RawParameter::new(*n, *a))
            .collect();
        PipeInterface::from_signature(&raw, ret)
    }

    #[test]
    fn rejects_two_non_optional_data_blocks() {
        let r = iface(
            &[("a", "DataBlock[T1]"), ("b", "DataBlock[T2]")],
            Some("DataBlock[T3]"),
        );
        assert!(matches!(r, Err(CoreError::InvalidSignature(_))));
    }

    #[test]
    fn allows_one_data_block_plus_dataset() {
        let r = iface(
            &[("a", "DataBlock[T]"), ("b", "DataSet[T]")],
            Some("DataBlock[T]"),
        );
        assert!(r.is_ok());
    }

    #[test]
    fn allows_second_data_block_if_optional() {
        let r = iface(
            &[("a", "DataBlock[T1]"), ("b", "Optional[DataBlock[T2]]")],
            None,
        );
        assert!(r.is_ok());
    }

    #[test]
    fn single_value_assignment_requires_exactly_one_slot() {
        let i = iface(&[("a", "DataBlock[T1]"), ("b", "DataSet[T2]")], None).unwrap();
        let r: CoreResult<HashMap<String, &str>> = i.assign_inputs(RawInputs::Single("up"));
        assert!(matches!(r, Err(CoreError::InvalidInputAssignment(_))));
    }

    #[test]
    fn single_value_assignment_ok_for_one_slot() {
        let i = iface(&[("a", "DataBlock[T1]")], None).unwrap();
        let r = i.assign_inputs(RawInputs::Single("up")).unwrap();
        assert_eq!(r.get("a"), Some(&"up"));
    }

    #[test]
    fn named_assignment_rejects_mismatched_keys() {
        let i = iface(&[("a", "DataBlock[T1]"), ("b", "DataSet[T2]")], None).unwrap();
        let mut map = HashMap::new();
        map.insert("a".to_string(), "x");
        let r = i.assign_inputs(RawInputs::Named(map));
        assert!(matches!(r, Err(CoreError::InvalidInputAssignment(_))));
    }

    #[test]
    fn named_assignment_ignores_this_key() {
        let i = iface(&[("this", "DataBlock[T]"), ("new", "DataBlock[T]")], None).unwrap();
        let mut map = HashMap::new();
        map.insert("this".to_string(), "self");
        map.insert("new".to_string(), "up");
        let r = i.assign_inputs(RawInputs::Named(map)).unwrap();
        assert_eq!(r.len(), 2);
    }
}
