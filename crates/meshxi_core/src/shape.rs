//! Element shape descriptors and classification of the xi domain.
//!
//! An element's reference domain is the unit hypercube, restricted on some
//! axes by a simplex constraint `sum(xi[axis]) <= 1`. The classifier runs once
//! per element and the resulting [`ReferenceDomain`] drives the starting point
//! and the clamping applied during Newton iteration.

use serde::{Deserialize, Serialize};

/// Shape of a single xi direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisShape {
    Line,
    /// Linked with the other simplex axes of the element.
    Simplex,
    /// Polygon angle direction; treated as a line for the purpose of limits.
    Polygon,
}

/// Shape of an element, one entry per xi direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementShape {
    axes: Vec<AxisShape>,
}

impl ElementShape {
    pub fn new(axes: Vec<AxisShape>) -> Self {
        Self { axes }
    }

    pub fn line() -> Self {
        Self::new(vec![AxisShape::Line])
    }

    pub fn square() -> Self {
        Self::new(vec![AxisShape::Line; 2])
    }

    pub fn cube() -> Self {
        Self::new(vec![AxisShape::Line; 3])
    }

    pub fn triangle() -> Self {
        Self::new(vec![AxisShape::Simplex; 2])
    }

    pub fn tetrahedron() -> Self {
        Self::new(vec![AxisShape::Simplex; 3])
    }

    /// A triangle swept along `line_axis`; the other two axes form the simplex.
    pub fn triangular_prism(line_axis: usize) -> Self {
        let axes = (0..3)
            .map(|axis| {
                if axis == line_axis {
                    AxisShape::Line
                } else {
                    AxisShape::Simplex
                }
            })
            .collect();
        Self::new(axes)
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[AxisShape] {
        &self.axes
    }
}

const TRIANGLE_AXES: [usize; 2] = [0, 1];
const TETRAHEDRON_AXES: [usize; 3] = [0, 1, 2];

/// Topology of the xi domain, as far as limits on xi are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceDomain {
    /// `[0,1]^dim` with no linked axes.
    Hypercube,
    /// 2-D simplex over axes 0 and 1.
    Triangle,
    /// 3-D element that is a simplex over two axes and a line over the third.
    TriangularPrism { simplex_axes: [usize; 2] },
    /// 3-D simplex over all axes.
    Tetrahedron,
}

impl ReferenceDomain {
    /// Classifies an element shape. Combinations that are not recognised fall
    /// back to [`ReferenceDomain::Hypercube`], which only loses the simplex limit.
    pub fn classify(shape: &ElementShape) -> Self {
        let simplex: Vec<usize> = shape
            .axes()
            .iter()
            .enumerate()
            .filter(|(_, axis)| **axis == AxisShape::Simplex)
            .map(|(index, _)| index)
            .collect();

        match (shape.dimension(), simplex.as_slice()) {
            (2, [0, 1]) => ReferenceDomain::Triangle,
            (3, [a, b]) => ReferenceDomain::TriangularPrism {
                simplex_axes: [*a, *b],
            },
            (3, [0, 1, 2]) => ReferenceDomain::Tetrahedron,
            _ => ReferenceDomain::Hypercube,
        }
    }

    /// Axes taking part in the simplex constraint; empty for a hypercube.
    pub fn simplex_axes(&self) -> &[usize] {
        match self {
            ReferenceDomain::Hypercube => &[],
            ReferenceDomain::Triangle => &TRIANGLE_AXES[..],
            ReferenceDomain::TriangularPrism { simplex_axes } => &simplex_axes[..],
            ReferenceDomain::Tetrahedron => &TETRAHEDRON_AXES[..],
        }
    }

    pub fn is_simplex(&self) -> bool {
        !matches!(self, ReferenceDomain::Hypercube)
    }

    /// Starting xi for Newton iteration: 0.5 on line axes and 0.33 on simplex
    /// axes. Not the exact simplex centroid, but elements are usually near linear.
    pub fn initial_xi(&self, dimension: usize) -> Vec<f64> {
        let mut xi = vec![0.5; dimension];
        for &axis in self.simplex_axes() {
            if axis < dimension {
                xi[axis] = 0.33;
            }
        }
        xi
    }

    /// Pulls `xi` back to within `tolerance` of the domain.
    ///
    /// Any overshoot of the simplex face is subtracted equally from the simplex
    /// axes first, then every axis is clamped to `[-tolerance, 1 + tolerance]`.
    pub fn clamp(&self, xi: &mut [f64], tolerance: f64) {
        let axes = self.simplex_axes();
        if !axes.is_empty() {
            let mut delta = -1.0 - tolerance;
            for &axis in axes {
                delta += xi[axis];
            }
            if delta > 0.0 {
                delta /= axes.len() as f64;
                for &axis in axes {
                    xi[axis] -= delta;
                }
            }
        }
        for value in xi.iter_mut() {
            if *value < -tolerance {
                *value = -tolerance;
            } else if *value > 1.0 + tolerance {
                *value = 1.0 + tolerance;
            }
        }
    }

    /// Returns true if `xi` lies in the domain expanded by `tolerance`.
    pub fn contains(&self, xi: &[f64], tolerance: f64) -> bool {
        let in_box = xi
            .iter()
            .all(|value| *value >= -tolerance && *value <= 1.0 + tolerance);
        let sum: f64 = self.simplex_axes().iter().map(|&axis| xi[axis]).sum();
        in_box && sum <= 1.0 + tolerance
    }
}
