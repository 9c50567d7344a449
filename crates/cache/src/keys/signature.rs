//! Parameter declarations and argument binding

use crate::errors::{CacheError, RecoveryHint, Result};
use crate::value::{Kwargs, Value};
use std::collections::HashSet;

/// How a parameter accepts arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParameterKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    kind: ParameterKind,
    default: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::PositionalOnly)
    }

    /// Accepts either a positional or a keyword argument
    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::PositionalOrKeyword)
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::VarPositional)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::KeywordOnly)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::VarKeyword)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn is_positional(&self) -> bool {
        matches!(
            self.kind,
            ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword
        )
    }

    fn is_variadic(&self) -> bool {
        matches!(
            self.kind,
            ParameterKind::VarPositional | ParameterKind::VarKeyword
        )
    }
}

/// Arguments after binding, in canonical order with defaults applied
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArguments {
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
}

/// Declared parameters of a callable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    parameters: Vec<Parameter>,
}

impl Signature {
    /// Validate and build a signature
    ///
    /// Parameters must be declared in kind order, names must be unique, at
    /// most one parameter of each variadic kind is allowed and positional
    /// parameters without defaults cannot follow ones with defaults.
    pub fn new(parameters: Vec<Parameter>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut seen_default = false;
        for (index, parameter) in parameters.iter().enumerate() {
            if !names.insert(parameter.name.as_str()) {
                return Err(CacheError::configuration(format!(
                    "duplicate parameter '{}'",
                    parameter.name
                )));
            }
            if let Some(previous) = index.checked_sub(1).map(|i| &parameters[i]) {
                let out_of_order = previous.kind > parameter.kind
                    || (previous.is_variadic() && previous.kind == parameter.kind);
                if out_of_order {
                    return Err(CacheError::configuration(format!(
                        "parameter '{}' is declared out of order",
                        parameter.name
                    )));
                }
            }
            if parameter.is_positional() {
                if parameter.default.is_some() {
                    seen_default = true;
                } else if seen_default {
                    return Err(CacheError::configuration(format!(
                        "parameter '{}' without a default follows one with a default",
                        parameter.name
                    )));
                }
            }
        }
        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Bind call arguments to the declared parameters
    ///
    /// Positional-or-keyword parameters end up positional whichever way they
    /// were passed, keyword-only parameters end up as keywords and every
    /// omitted parameter takes its default.
    pub fn bind(&self, callable: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<BoundArguments> {
        let invalid = |reason: String| CacheError::InvalidCall {
            callable: callable.to_string(),
            reason,
            recovery_hint: RecoveryHint::FixArguments,
        };

        let positional: Vec<usize> = self
            .parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_positional())
            .map(|(index, _)| index)
            .collect();
        let var_positional = self
            .parameters
            .iter()
            .find(|p| p.kind == ParameterKind::VarPositional);
        let accepts_var_keyword = self
            .parameters
            .iter()
            .any(|p| p.kind == ParameterKind::VarKeyword);

        let mut slots: Vec<Option<Value>> = vec![None; self.parameters.len()];
        let mut extra_args = Vec::new();
        let mut extra_kwargs = Kwargs::new();

        let mut args = args.into_iter();
        for &index in &positional {
            match args.next() {
                Some(value) => slots[index] = Some(value),
                None => break,
            }
        }
        extra_args.extend(args);
        if !extra_args.is_empty() && var_positional.is_none() {
            return Err(invalid(format!(
                "takes {} positional arguments but {} were given",
                positional.len(),
                positional.len() + extra_args.len()
            )));
        }

        for (name, value) in kwargs {
            let index = self.parameters.iter().position(|p| {
                p.name == name
                    && matches!(
                        p.kind,
                        ParameterKind::PositionalOrKeyword | ParameterKind::KeywordOnly
                    )
            });
            match index {
                Some(index) if slots[index].is_some() => {
                    return Err(invalid(format!("got multiple values for argument '{name}'")));
                }
                Some(index) => slots[index] = Some(value),
                None if accepts_var_keyword => {
                    extra_kwargs.insert(name, value);
                }
                None if self.parameters.iter().any(|p| p.name == name) => {
                    return Err(invalid(format!(
                        "positional-only argument '{name}' passed as keyword"
                    )));
                }
                None => {
                    return Err(invalid(format!("got an unexpected keyword argument '{name}'")));
                }
            }
        }

        let mut bound = BoundArguments::default();
        for (parameter, slot) in self.parameters.iter().zip(slots) {
            let value = match (slot, parameter.kind) {
                (_, ParameterKind::VarPositional) => {
                    bound.args.append(&mut extra_args);
                    continue;
                }
                (_, ParameterKind::VarKeyword) => {
                    bound.kwargs.append(&mut extra_kwargs);
                    continue;
                }
                (Some(value), _) => value,
                (None, _) => parameter.default.clone().ok_or_else(|| {
                    invalid(format!("missing required argument '{}'", parameter.name))
                })?,
            };
            if parameter.is_positional() {
                bound.args.push(value);
            } else {
                bound.kwargs.insert(parameter.name.clone(), value);
            }
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::kwargs;

    fn f_signature() -> Signature {
        Signature::new(vec![
            Parameter::positional("a"),
            Parameter::positional("b").with_default(1),
            Parameter::keyword_only("c").with_default("x"),
        ])
        .unwrap()
    }

    #[test]
    fn test_keyword_for_positional_parameter_binds_positionally() {
        let sig = f_signature();
        let by_keyword = sig
            .bind("f", vec![Value::Int(1)], kwargs([("b", 2)]))
            .unwrap();
        let by_position = sig
            .bind("f", vec![Value::Int(1), Value::Int(2)], Kwargs::new())
            .unwrap();
        assert_eq!(by_keyword, by_position);
        assert_eq!(by_keyword.args, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(by_keyword.kwargs, kwargs([("c", "x")]));
    }

    #[test]
    fn test_defaults_are_applied() {
        let bound = f_signature()
            .bind("f", vec![], kwargs([("a", 5)]))
            .unwrap();
        assert_eq!(bound.args, vec![Value::Int(5), Value::Int(1)]);
    }

    #[test]
    fn test_variadics_collect_extras() {
        let sig = Signature::new(vec![
            Parameter::positional_only("a"),
            Parameter::var_positional("rest"),
            Parameter::var_keyword("options"),
        ])
        .unwrap();
        let bound = sig
            .bind(
                "g",
                vec![Value::Int(1), Value::Int(2), Value::Int(3)],
                kwargs([("z", 1), ("a", 2)]),
            )
            .unwrap();
        assert_eq!(bound.args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(bound.kwargs, kwargs([("a", 2), ("z", 1)]));
    }

    #[test]
    fn test_binding_errors() {
        let sig = f_signature();
        let cases = [
            (vec![], Kwargs::new(), "missing required argument 'a'"),
            (
                vec![Value::Int(1), Value::Int(2), Value::Int(3)],
                Kwargs::new(),
                "positional arguments",
            ),
            (vec![Value::Int(1)], kwargs([("a", 1)]), "multiple values"),
            (vec![Value::Int(1)], kwargs([("nope", 1)]), "unexpected keyword"),
        ];
        for (args, kw, expected) in cases {
            let err = sig.bind("f", args, kw).unwrap_err();
            assert!(matches!(err, CacheError::InvalidCall { .. }));
            assert!(err.to_string().contains(expected), "{err}");
        }

        let positional_only = Signature::new(vec![Parameter::positional_only("a")]).unwrap();
        let err = positional_only
            .bind("h", vec![], kwargs([("a", 1)]))
            .unwrap_err();
        assert!(err.to_string().contains("positional-only"));
    }

    #[test]
    fn test_invalid_declarations() {
        assert!(Signature::new(vec![Parameter::positional("a"), Parameter::positional("a")]).is_err());
        assert!(Signature::new(vec![
            Parameter::keyword_only("a"),
            Parameter::positional("b")
        ])
        .is_err());
        assert!(Signature::new(vec![
            Parameter::positional("a").with_default(1),
            Parameter::positional("b")
        ])
        .is_err());
    }
}
