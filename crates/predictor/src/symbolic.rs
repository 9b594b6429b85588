//! Symbolic models: one closed-form expression per target.

use dataset::{Column, Table};
use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, Function,
    HashMapContext, Node, Value,
};
use model_structs::ModelSchema;
use serde::{Deserialize, Serialize};

use crate::{Predictor, PredictorError};

/// Serialized form of a trained symbolic model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SymbolicModelArtifact {
    /// One expression per target, over `x0..x{n-1}`.
    pub equations: Vec<String>,
}

#[derive(Debug, Clone)]
struct Equation {
    source: String,
    tree: Node,
}

/// A loaded symbolic model bound to its feature and target columns.
#[derive(Debug, Clone)]
pub struct SymbolicModel {
    equations: Vec<Equation>,
    schema: ModelSchema,
}

impl SymbolicModel {
    /// Decodes an artifact from JSON bytes and binds it to `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid artifact or the
    /// equations do not match the schema.
    pub fn from_json(bytes: &[u8], schema: ModelSchema) -> Result<Self, PredictorError> {
        let artifact: SymbolicModelArtifact = serde_json::from_slice(bytes)?;
        Self::from_artifact(&artifact, schema)
    }

    /// Parses every equation and checks it against `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of equations differs from the number of
    /// targets, an equation does not parse, or it references a variable that
    /// is not one of the feature variables.
    pub fn from_artifact(
        artifact: &SymbolicModelArtifact,
        schema: ModelSchema,
    ) -> Result<Self, PredictorError> {
        if artifact.equations.len() != schema.targets.len() {
            return Err(PredictorError::EquationCount {
                expected: schema.targets.len(),
                actual: artifact.equations.len(),
            });
        }

        let n_features = schema.features.len();
        let mut equations = Vec::with_capacity(artifact.equations.len());

        for source in &artifact.equations {
            // Regressors print powers Python-style, and Python divides integers
            // as floats.
            let normalized = float_literals(&source.replace("**", "^"));
            let tree = evalexpr::build_operator_tree(&normalized).map_err(|source_error| {
                PredictorError::Parse {
                    equation: source.clone(),
                    source: source_error,
                }
            })?;

            if let Some(variable) = tree
                .iter_variable_identifiers()
                .find(|name| feature_index(name).is_none_or(|i| i >= n_features))
            {
                return Err(PredictorError::UnknownVariable {
                    equation: source.clone(),
                    variable: variable.to_string(),
                });
            }

            equations.push(Equation {
                source: source.clone(),
                tree,
            });
        }

        Ok(Self { equations, schema })
    }

    #[must_use]
    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    /// The equations as they were stored.
    pub fn equations(&self) -> impl Iterator<Item = &str> {
        self.equations.iter().map(|e| e.source.as_str())
    }
}

impl Predictor for SymbolicModel {
    fn predict(&self, features: &Table) -> Result<Table, PredictorError> {
        if features.n_columns() != self.schema.features.len() {
            return Err(PredictorError::FeatureCount {
                expected: self.schema.features.len(),
                actual: features.n_columns(),
            });
        }

        let mut context = function_context().map_err(|source| PredictorError::Evaluation {
            row: 0,
            source,
        })?;

        let mut outputs: Vec<Vec<f64>> = vec![Vec::with_capacity(features.n_rows()); self.equations.len()];

        for row in 0..features.n_rows() {
            let evaluation_error = |source| PredictorError::Evaluation { row: row + 1, source };

            for (index, column) in features.columns().iter().enumerate() {
                context
                    .set_value(format!("x{index}"), Value::Float(column.values[row]))
                    .map_err(evaluation_error)?;
            }

            for (equation, output) in self.equations.iter().zip(outputs.iter_mut()) {
                let value = equation
                    .tree
                    .eval_with_context(&context)
                    .and_then(|value| value.as_number())
                    .map_err(evaluation_error)?;
                if !value.is_finite() {
                    return Err(PredictorError::NonFinite {
                        row: row + 1,
                        equation: equation.source.clone(),
                    });
                }
                output.push(value);
            }
        }

        let columns = self
            .schema
            .targets
            .iter()
            .zip(outputs)
            .map(|(name, values)| Column {
                name: name.to_string(),
                values,
            })
            .collect();

        Ok(Table::new(columns)?)
    }
}

/// Parses `x<index>` variable names.
fn feature_index(name: &str) -> Option<usize> {
    name.strip_prefix('x')?.parse().ok()
}

/// Appends `.0` to every integer literal so that evaluation never falls back
/// to integer arithmetic (`1/3` must not truncate to 0).
fn float_literals(expression: &str) -> String {
    let mut normalized = String::with_capacity(expression.len() + 8);
    let mut chars = expression.chars().peekable();
    let mut previous: Option<char> = None;

    while let Some(c) = chars.next() {
        normalized.push(c);
        // Digits inside identifiers (`x12`) or after a decimal point are not
        // the start of a literal.
        let starts_literal = c.is_ascii_digit()
            && !previous.is_some_and(|p| p.is_alphanumeric() || p == '_' || p == '.');
        previous = Some(c);
        if !starts_literal {
            continue;
        }

        let mut integral = true;
        while let Some(&next) = chars.peek() {
            let exponent_sign =
                matches!(next, '+' | '-') && matches!(previous, Some('e' | 'E')) && !integral;
            if matches!(next, '.' | 'e' | 'E') {
                integral = false;
            } else if !next.is_ascii_digit() && !exponent_sign {
                break;
            }
            normalized.push(next);
            previous = Some(next);
            chars.next();
        }

        if integral {
            normalized.push_str(".0");
        }
    }

    normalized
}

/// Unary functions regressors commonly emit, under their plain names.
fn function_context() -> Result<HashMapContext, EvalexprError> {
    let mut context = HashMapContext::new();

    let unary: [(&str, fn(f64) -> f64); 9] = [
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("ln", f64::ln),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("abs", f64::abs),
        ("square", |x| x * x),
    ];

    for (name, op) in unary {
        context.set_function(
            name.to_string(),
            Function::new(move |argument| Ok(Value::Float(op(argument.as_number()?)))),
        )?;
    }

    Ok(context)
}

#[cfg(test)]
mod tests {
    use model_structs::ColumnSpec;

    use super::*;

    fn schema(features: &str, targets: &str) -> ModelSchema {
        ModelSchema {
            features: features.parse::<ColumnSpec>().unwrap(),
            targets: targets.parse::<ColumnSpec>().unwrap(),
        }
    }

    fn features(columns: &[(&str, &[f64])]) -> Table {
        Table::new(
            columns
                .iter()
                .map(|(name, values)| Column {
                    name: (*name).to_string(),
                    values: values.to_vec(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_linear_equation() {
        let artifact = SymbolicModelArtifact {
            equations: vec!["2.0 * x0 + x1 - 1.5".to_string()],
        };
        let model = SymbolicModel::from_artifact(&artifact, schema("Temperature;Price", "Sales")).unwrap();

        let predictions = model
            .predict(&features(&[("Temperature", &[1.0, 2.0]), ("Price", &[10.0, 0.5])]))
            .unwrap();

        assert_eq!(predictions.column_names(), vec!["Sales"]);
        assert_eq!(predictions.columns()[0].values, vec![10.5, 3.0]);
    }

    #[test]
    fn test_python_power_and_functions() {
        let artifact = SymbolicModelArtifact {
            equations: vec!["x0**2".to_string(), "sqrt(x0) + 1".to_string()],
        };
        let model = SymbolicModel::from_artifact(&artifact, schema("t", "a;b")).unwrap();

        let predictions = model.predict(&features(&[("t", &[4.0])])).unwrap();

        assert_eq!(predictions.row(0), Some(vec![16.0, 3.0]));
    }

    #[test]
    fn test_equation_count_must_match_targets() {
        let artifact = SymbolicModelArtifact {
            equations: vec!["x0".to_string()],
        };
        let err = SymbolicModel::from_artifact(&artifact, schema("t", "a;b")).unwrap_err();
        assert!(matches!(err, PredictorError::EquationCount { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_unknown_variable_is_rejected() {
        let artifact = SymbolicModelArtifact {
            equations: vec!["x0 + x3".to_string()],
        };
        let err = SymbolicModel::from_artifact(&artifact, schema("a;b", "y")).unwrap_err();
        assert!(matches!(err, PredictorError::UnknownVariable { ref variable, .. } if variable == "x3"));
    }

    #[test]
    fn test_from_json() {
        let json = br#"{"equations": ["x0 * 3.0"]}"#;
        let model = SymbolicModel::from_json(json, schema("a", "y")).unwrap();
        assert_eq!(model.equations().collect::<Vec<_>>(), vec!["x0 * 3.0"]);
        assert_eq!(model.schema().targets.names(), ["y"]);
    }

    #[test]
    fn test_integer_literals_are_floats() {
        assert_eq!(float_literals("x0**(1/3)"), "x0**(1.0/3.0)");
        assert_eq!(float_literals("x12 * 2 + 1.5e-3 - 4E2"), "x12 * 2.0 + 1.5e-3 - 4E2");
        assert_eq!(float_literals("sqrt(x0) + 10"), "sqrt(x0) + 10.0");
    }

    #[test]
    fn test_integer_division_follows_python() {
        let artifact = SymbolicModelArtifact {
            equations: vec![
                "x0**(1/3)".to_string(),
                "x0 * (1/2)".to_string(),
                "3000000000 * 4000000000 + x0".to_string(),
            ],
        };
        let model = SymbolicModel::from_artifact(&artifact, schema("t", "a;b;c")).unwrap();

        let row = model.predict(&features(&[("t", &[8.0])])).unwrap().row(0).unwrap();

        assert!((row[0] - 2.0).abs() < 1e-12);
        assert!((row[1] - 4.0).abs() < 1e-12);
        assert!((row[2] - 1.2e19).abs() < 1e6);
    }

    #[test]
    fn test_non_finite_prediction_is_an_error() {
        let artifact = SymbolicModelArtifact {
            equations: vec!["log(x0)".to_string()],
        };
        let model = SymbolicModel::from_artifact(&artifact, schema("t", "y")).unwrap();

        let err = model.predict(&features(&[("t", &[1.0, -1.0])])).unwrap_err();
        assert!(matches!(err, PredictorError::NonFinite { row: 2, .. }));

        let artifact = SymbolicModelArtifact {
            equations: vec!["x0 / 0".to_string()],
        };
        let model = SymbolicModel::from_artifact(&artifact, schema("t", "y")).unwrap();
        assert!(matches!(
            model.predict(&features(&[("t", &[1.0])])),
            Err(PredictorError::NonFinite { row: 1, .. })
        ));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let artifact = SymbolicModelArtifact {
            equations: vec!["x0".to_string()],
        };
        let model = SymbolicModel::from_artifact(&artifact, schema("a;b", "y")).unwrap();
        let err = model.predict(&features(&[("a", &[1.0])])).unwrap_err();
        assert!(matches!(err, PredictorError::FeatureCount { expected: 2, actual: 1 }));
    }
}
