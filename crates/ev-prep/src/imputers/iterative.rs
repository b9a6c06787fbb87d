//! Iterative (round-robin regression) imputation.
//!
//! Missing entries start at the column mean. Each iteration then regresses
//! every incomplete column on the other selected columns, fitting a ridge
//! model on the rows where that column was observed and predicting the rows
//! where it was missing. Predictors use the current estimates, so later
//! columns see the refinements made to earlier ones.

use crate::config::{DEFAULT_MAX_ITERATIONS, DEFAULT_RIDGE_ALPHA, ImputationOrder, ImputationPolicy};
use crate::error::{PrepError, Result};
use crate::profiler::statistics::mean;
use crate::utils::observed;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

/// Pivot magnitude below which a normal-equation system is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Result of an iterative imputation run.
#[derive(Debug, Clone)]
pub struct IterativeFit {
    /// Completed values, one row per table row, one column per selected column.
    pub matrix: Array2<f64>,
    /// Iterations actually performed.
    pub iterations: usize,
}

impl IterativeFit {
    /// Completed values of column `index`.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.matrix.column(index).to_vec()
    }
}

/// Round-robin ridge regression imputer.
#[derive(Debug, Clone)]
pub struct IterativeImputer {
    max_iterations: usize,
    seed: u64,
    order: ImputationOrder,
    ridge_alpha: f64,
    tolerance: Option<f64>,
}

impl Default for IterativeImputer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS, 0)
    }
}

impl IterativeImputer {
    /// Create an imputer running `max_iterations` rounds (at least one).
    pub fn new(max_iterations: usize, seed: u64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            seed,
            order: ImputationOrder::Ascending,
            ridge_alpha: DEFAULT_RIDGE_ALPHA,
            tolerance: None,
        }
    }

    /// Build from an [`ImputationPolicy::IterativeFill`]; `None` for other policies.
    pub fn from_policy(policy: &ImputationPolicy) -> Option<Self> {
        match *policy {
            ImputationPolicy::IterativeFill {
                max_iterations,
                seed,
                order,
                ridge_alpha,
                tolerance,
            } => Some(Self {
                max_iterations: max_iterations.max(1),
                seed,
                order,
                ridge_alpha,
                tolerance,
            }),
            ImputationPolicy::MeanFill => None,
        }
    }

    pub fn with_order(mut self, order: ImputationOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_ridge_alpha(mut self, alpha: f64) -> Self {
        self.ridge_alpha = alpha.max(0.0);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Impute the given columns. `values[j]` holds column `names[j]`; all
    /// columns must have the same length.
    pub fn fit_transform(&self, names: &[String], values: &[Vec<Option<f64>>]) -> Result<IterativeFit> {
        let n_cols = values.len();
        let n_rows = values.first().map_or(0, Vec::len);
        if values.iter().any(|v| v.len() != n_rows) {
            return Err(PrepError::invalid_parameter(
                "values",
                "columns must have equal length",
            ));
        }

        let mut matrix = Array2::<f64>::zeros((n_rows, n_cols));
        let mut missing: Vec<Vec<usize>> = Vec::with_capacity(n_cols);
        let mut training: Vec<Vec<usize>> = Vec::with_capacity(n_cols);
        let mut scale: f64 = 0.0;

        for (j, column) in values.iter().enumerate() {
            let obs = observed(column);
            let (rows, train): (Vec<usize>, Vec<usize>) =
                (0..n_rows).partition(|&i| column[i].is_none());
            let fill = match mean(&obs) {
                Some(m) => m,
                None if rows.is_empty() => 0.0,
                None => return Err(PrepError::EmptyColumn(names[j].clone())),
            };
            for (i, v) in column.iter().enumerate() {
                matrix[[i, j]] = v.unwrap_or(fill);
            }
            scale = obs.iter().fold(scale, |acc, x| acc.max(x.abs()));
            missing.push(rows);
            training.push(train);
        }

        let mut targets: Vec<usize> = (0..n_cols).filter(|&j| !missing[j].is_empty()).collect();
        if targets.is_empty() || n_cols < 2 {
            // Nothing to regress; the mean fill is final.
            return Ok(IterativeFit {
                matrix,
                iterations: 0,
            });
        }

        if self.order == ImputationOrder::Ascending {
            targets.sort_by_key(|&j| missing[j].len());
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let mut iterations = 0;
        for iteration in 0..self.max_iterations {
            if self.order == ImputationOrder::Random {
                targets.shuffle(&mut rng);
            }

            let mut max_change: f64 = 0.0;
            for &target in &targets {
                let change =
                    self.update_column(&mut matrix, target, &missing[target], &training[target]);
                max_change = max_change.max(change);
            }
            iterations = iteration + 1;

            let relative = max_change / scale;
            debug!("Iteration {}: max relative change {:.3e}", iterations, relative);
            if let Some(tol) = self.tolerance
                && relative < tol
            {
                debug!("Converged after {} iterations", iterations);
                break;
            }
        }

        Ok(IterativeFit { matrix, iterations })
    }

    /// Refit one column on the others and overwrite its missing rows.
    /// Returns the largest absolute change made.
    fn update_column(
        &self,
        matrix: &mut Array2<f64>,
        target: usize,
        missing_rows: &[usize],
        train_rows: &[usize],
    ) -> f64 {
        let predictors: Vec<usize> = (0..matrix.ncols()).filter(|&j| j != target).collect();

        let x_train = matrix.select(Axis(0), train_rows).select(Axis(1), &predictors);
        let y_train = matrix.column(target).select(Axis(0), train_rows);

        let Some((coefficients, intercept)) = ridge_fit(x_train.view(), &y_train, self.ridge_alpha)
        else {
            debug!("Column {} has a singular design; keeping current estimates", target);
            return 0.0;
        };

        let mut max_change: f64 = 0.0;
        for &row in missing_rows {
            let prediction = intercept
                + predictors
                    .iter()
                    .zip(coefficients.iter())
                    .map(|(&j, b)| matrix[[row, j]] * b)
                    .sum::<f64>();
            max_change = max_change.max((prediction - matrix[[row, target]]).abs());
            matrix[[row, target]] = prediction;
        }
        max_change
    }
}

/// Fit `y ~ x` by ridge regression on centered data.
///
/// Solves `(XcᵀXc + αI) β = Xcᵀyc`; the intercept is `ȳ − x̄ᵀβ`. Returns
/// `None` when the system is singular.
fn ridge_fit(x: ArrayView2<f64>, y: &Array1<f64>, alpha: f64) -> Option<(Array1<f64>, f64)> {
    let n = x.nrows();
    if n == 0 {
        return None;
    }
    let x_mean = x.mean_axis(Axis(0))?;
    let y_mean = y.mean()?;

    let xc = &x - &x_mean;
    let yc = y - y_mean;

    let mut gram = xc.t().dot(&xc);
    for k in 0..gram.nrows() {
        gram[[k, k]] += alpha;
    }
    let rhs = xc.t().dot(&yc);

    let beta = solve(gram, rhs)?;
    let intercept = y_mean - x_mean.dot(&beta);
    Some((beta, intercept))
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < SINGULAR_EPS {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let delta = factor * a[[col, k]];
                a[[row, k]] -= delta;
            }
            let delta = factor * b[col];
            b[row] -= delta;
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}
