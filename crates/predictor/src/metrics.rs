use dataset::Table;

use crate::PredictorError;

/// Mean absolute error between two tables of the same shape.
///
/// The error is computed for each column pair (matched by position) and the
/// per-column errors are averaged.
///
/// # Errors
///
/// Returns an error if the tables differ in row or column count, are empty,
/// or hold values that make the error non-finite.
#[expect(clippy::cast_precision_loss)]
pub fn mean_absolute_error(y_true: &Table, y_pred: &Table) -> Result<f64, PredictorError> {
    if y_true.n_columns() != y_pred.n_columns() {
        return Err(PredictorError::ShapeMismatch(format!(
            "{} target columns vs {} predicted columns",
            y_true.n_columns(),
            y_pred.n_columns()
        )));
    }
    if y_true.n_rows() != y_pred.n_rows() {
        return Err(PredictorError::ShapeMismatch(format!(
            "{} target rows vs {} predicted rows",
            y_true.n_rows(),
            y_pred.n_rows()
        )));
    }
    if y_true.n_rows() == 0 || y_true.n_columns() == 0 {
        return Err(PredictorError::NoRows);
    }

    let n_rows = y_true.n_rows() as f64;
    let total: f64 = y_true
        .columns()
        .iter()
        .zip(y_pred.columns())
        .map(|(truth, pred)| {
            truth
                .values
                .iter()
                .zip(&pred.values)
                .map(|(t, p)| (t - p).abs())
                .sum::<f64>()
                / n_rows
        })
        .sum();

    let mae = total / y_true.n_columns() as f64;
    if !mae.is_finite() {
        return Err(PredictorError::NonFiniteMetric);
    }
    Ok(mae)
}
