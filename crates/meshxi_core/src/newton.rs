//! Per-element inverse evaluation by damped Gauss-Newton iteration.
//!
//! For a single element, finds xi such that the field evaluated at xi matches
//! a target vector. The field may have more components than the element has xi
//! directions, in which case the update solves the normal equations
//! `(D^T D) dxi = D^T (target - value)` of the least-squares problem.

use crate::error::{FindXiError, Result};
use crate::shape::ReferenceDomain;
use crate::traits::{ElementOf, Field, Mesh};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Largest element dimension handled by the solver.
pub const MAXIMUM_ELEMENT_XI_DIMENSIONS: usize = 3;

/// Whether a search requires the target to be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Only a location where the field equals the target is returned.
    #[default]
    Exact,
    /// Without an exact match, returns the location closest to the target.
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindXiSettings {
    /// Convergence limit on every xi increment; also the slack allowed outside
    /// the element domain while iterating.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Factor applied to the projected last increment when checking that an
    /// overdetermined fit matches every component. Loosened on purpose.
    pub residual_margin: f64,
    /// Time passed through to field evaluation.
    pub time: f64,
    /// Skip elements whose value range excludes the target. Ignored when
    /// searching for the nearest location.
    pub use_value_ranges: bool,
    pub search_mode: SearchMode,
    /// Only elements of this dimension are searched.
    pub element_dimension: Option<usize>,
}

impl Default for FindXiSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 10,
            residual_margin: 2.0,
            time: 0.0,
            use_value_ranges: true,
            search_mode: SearchMode::Exact,
            element_dimension: None,
        }
    }
}

impl FindXiSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) || !self.tolerance.is_finite() {
            return Err(FindXiError::InvalidSettings(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(FindXiError::InvalidSettings(
                "max_iterations must be greater than zero".to_string(),
            ));
        }
        if !(self.residual_margin > 0.0) || !self.residual_margin.is_finite() {
            return Err(FindXiError::InvalidSettings(format!(
                "residual_margin must be positive, got {}",
                self.residual_margin
            )));
        }
        if let Some(dim) = self.element_dimension {
            if dim == 0 || dim > MAXIMUM_ELEMENT_XI_DIMENSIONS {
                return Err(FindXiError::InvalidSettings(format!(
                    "element_dimension must be between 1 and {}, got {}",
                    MAXIMUM_ELEMENT_XI_DIMENSIONS, dim
                )));
            }
        }
        if !self.time.is_finite() {
            return Err(FindXiError::InvalidSettings(format!(
                "time must be finite, got {}",
                self.time
            )));
        }
        Ok(())
    }
}

/// Why iteration on an element stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Converged,
    /// Normal equations had no pivot; typical of collapsed elements.
    Singular,
    IterationLimit,
    /// xi did not move after clamping; the solution is usually outside the element.
    Stalled,
    /// Nominally converged, but an overdetermined component is not matched.
    ResidualMismatch,
    EvaluationFailed,
    /// More xi directions than field components.
    Underdetermined,
    UnsupportedDimension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementXiSolution {
    pub xi: Vec<f64>,
    pub converged: bool,
    /// Corrective updates applied before convergence was detected.
    pub steps: usize,
    pub termination: Termination,
}

impl ElementXiSolution {
    fn rejected(xi: Vec<f64>, steps: usize, termination: Termination) -> Self {
        Self {
            xi,
            converged: false,
            steps,
            termination,
        }
    }
}

/// Solves for xi one element at a time against a fixed target.
///
/// Holds its own copy of the target so that no evaluation of the field, however
/// it caches values internally, can alter the values being searched for. The
/// value and derivative buffers are reused across elements.
pub struct ElementXiSolver<'a, F: Field + ?Sized> {
    field: &'a F,
    target: Vec<f64>,
    settings: FindXiSettings,
    values: Vec<f64>,
    derivatives: Vec<f64>,
    derivative_dimension: usize,
}

impl<'a, F: Field + ?Sized> ElementXiSolver<'a, F> {
    pub fn new(field: &'a F, target: &[f64], settings: FindXiSettings) -> Self {
        let number_of_values = target.len();
        Self {
            field,
            target: target.to_vec(),
            settings,
            values: vec![0.0; number_of_values],
            derivatives: Vec::new(),
            derivative_dimension: 0,
        }
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    pub fn settings(&self) -> &FindXiSettings {
        &self.settings
    }

    pub fn solve(&mut self, element: ElementOf<F>) -> ElementXiSolution {
        let field = self.field;
        let mesh = field.mesh();
        let dim = mesh.element_dimension(element);
        let number_of_values = self.target.len();
        if dim == 0 || dim > MAXIMUM_ELEMENT_XI_DIMENSIONS {
            log::warn!("Element {:?} has unsupported dimension {}", element, dim);
            return ElementXiSolution::rejected(Vec::new(), 0, Termination::UnsupportedDimension);
        }
        if dim > number_of_values {
            log::warn!(
                "Element {:?}: cannot solve underdetermined system ({} xi, {} values)",
                element,
                dim,
                number_of_values
            );
            return ElementXiSolution::rejected(vec![0.0; dim], 0, Termination::Underdetermined);
        }
        self.prepare_derivatives(dim);

        let domain = ReferenceDomain::classify(&mesh.element_shape(element));
        let tolerance = self.settings.tolerance;
        let mut xi = domain.initial_xi(dim);
        let mut last_xi = xi.clone();
        let mut steps = 0usize;
        let mut iterations = 0usize;

        let delta = loop {
            if let Err(err) = field.evaluate(
                element,
                &xi,
                self.settings.time,
                &mut self.values,
                &mut self.derivatives,
            ) {
                log::warn!("Could not evaluate field in element {:?}: {:#}", element, err);
                return ElementXiSolution::rejected(xi, steps, Termination::EvaluationFailed);
            }

            let delta = match self.normal_equations_step(dim) {
                Some(delta) => delta,
                None => {
                    // Collapsed elements land here at every xi, so this is not reported.
                    log::trace!("Element {:?}: singular normal equations", element);
                    return ElementXiSolution::rejected(xi, steps, Termination::Singular);
                }
            };

            let converged = delta.iter().all(|d| d.abs() <= tolerance);
            for (value, d) in xi.iter_mut().zip(delta.iter()) {
                *value += d;
            }
            iterations += 1;
            if converged {
                break delta;
            }

            steps += 1;
            domain.clamp(&mut xi, tolerance);
            if iterations >= self.settings.max_iterations {
                log::trace!("Element {:?}: iteration limit reached", element);
                return ElementXiSolution::rejected(xi, steps, Termination::IterationLimit);
            }
            if iterations > 1 && xi == last_xi {
                log::trace!("Element {:?}: xi stalled at {:?}", element, xi);
                return ElementXiSolution::rejected(xi, steps, Termination::Stalled);
            }
            last_xi.copy_from_slice(&xi);
        };

        if number_of_values > dim && !self.residual_consistent(dim, &delta) {
            log::trace!("Element {:?}: overdetermined residual not matched", element);
            return ElementXiSolution::rejected(xi, steps, Termination::ResidualMismatch);
        }

        ElementXiSolution {
            xi,
            converged: true,
            steps,
            termination: Termination::Converged,
        }
    }

    /// Clamps `xi` into the element and returns it with the Euclidean distance
    /// between the field there and the target.
    pub fn distance_at(
        &mut self,
        element: ElementOf<F>,
        mut xi: Vec<f64>,
    ) -> Option<(Vec<f64>, f64)> {
        let field = self.field;
        let mesh = field.mesh();
        let dim = mesh.element_dimension(element);
        if dim == 0 || xi.len() != dim {
            return None;
        }
        self.prepare_derivatives(dim);
        let domain = ReferenceDomain::classify(&mesh.element_shape(element));
        domain.clamp(&mut xi, self.settings.tolerance);
        if let Err(err) = field.evaluate(
            element,
            &xi,
            self.settings.time,
            &mut self.values,
            &mut self.derivatives,
        ) {
            log::warn!("Could not evaluate field in element {:?}: {:#}", element, err);
            return None;
        }
        let distance = self
            .target
            .iter()
            .zip(self.values.iter())
            .map(|(target, value)| (target - value).powi(2))
            .sum::<f64>()
            .sqrt();
        distance.is_finite().then_some((xi, distance))
    }

    fn prepare_derivatives(&mut self, dim: usize) {
        if self.derivative_dimension != dim {
            self.derivatives.resize(self.target.len() * dim, 0.0);
            self.derivative_dimension = dim;
        }
    }

    /// Solves `(D^T D) dxi = D^T (target - value)` by partial pivot LU.
    fn normal_equations_step(&self, dim: usize) -> Option<Vec<f64>> {
        let number_of_values = self.target.len();
        let d_matrix = DMatrix::from_row_slice(number_of_values, dim, &self.derivatives);
        let residual = DVector::from_iterator(
            number_of_values,
            self.target
                .iter()
                .zip(self.values.iter())
                .map(|(target, value)| target - value),
        );
        let a_matrix = d_matrix.transpose() * &d_matrix;
        let rhs = d_matrix.transpose() * residual;
        a_matrix
            .lu()
            .solve(&rhs)
            .filter(|v| v.iter().all(|value| value.is_finite()))
            .map(|v| v.iter().cloned().collect())
    }

    /// With more components than xi directions the least-squares step can
    /// converge while matching some components at the expense of others. Each
    /// component's projected change over the last increment, scaled by the
    /// residual margin, must cover its remaining discrepancy.
    fn residual_consistent(&self, dim: usize, delta: &[f64]) -> bool {
        (0..self.target.len()).all(|k| {
            let row = &self.derivatives[k * dim..(k + 1) * dim];
            let projected: f64 = row.iter().zip(delta.iter()).map(|(d, x)| d * x).sum();
            let discrepancy = (self.target[k] - self.values[k]).abs();
            self.settings.residual_margin * projected.abs() >= discrepancy
        })
    }
}
