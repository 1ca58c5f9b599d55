//! Linear Lagrange interpolation of nodal values over a mesh.
//!
//! A ready-made [`Field`] for callers without their own evaluator, e.g. a
//! coordinate or texture-coordinate field stored per node. Each element
//! interpolates the values at its vertex nodes.
//!
//! Node order within an element: xi1 varies fastest on line directions; simplex
//! vertices start at the origin followed by the unit point on each axis.

use crate::error::{FindXiError, Result};
use crate::range::ValueRange;
use crate::shape::ElementShape;
use crate::traits::{ElementGroup, Field, Mesh};
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MAXIMUM_ELEMENT_NODES: usize = 8;
const MAXIMUM_DIMENSION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Line,
    Square,
    Cube,
    Triangle,
    Tetrahedron,
    /// Triangle in xi1, xi2 swept along xi3.
    Wedge,
}

/// Linear basis on one line direction, node at xi = 0 or xi = 1.
fn line_weight(node: usize, x: f64) -> f64 {
    if node == 0 {
        1.0 - x
    } else {
        x
    }
}

fn line_derivative(node: usize) -> f64 {
    if node == 0 {
        -1.0
    } else {
        1.0
    }
}

/// Barycentric weight of simplex vertex `vertex` and its derivatives.
fn simplex_weight(vertex: usize, xi: &[f64]) -> f64 {
    if vertex == 0 {
        1.0 - xi.iter().sum::<f64>()
    } else {
        xi[vertex - 1]
    }
}

fn simplex_derivative(vertex: usize, axis: usize) -> f64 {
    if vertex == 0 {
        -1.0
    } else if vertex - 1 == axis {
        1.0
    } else {
        0.0
    }
}

impl ElementKind {
    pub fn dimension(&self) -> usize {
        match self {
            ElementKind::Line => 1,
            ElementKind::Square | ElementKind::Triangle => 2,
            ElementKind::Cube | ElementKind::Tetrahedron | ElementKind::Wedge => 3,
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        match self {
            ElementKind::Line => 2,
            ElementKind::Square => 4,
            ElementKind::Cube => 8,
            ElementKind::Triangle => 3,
            ElementKind::Tetrahedron => 4,
            ElementKind::Wedge => 6,
        }
    }

    pub fn shape(&self) -> ElementShape {
        match self {
            ElementKind::Line => ElementShape::line(),
            ElementKind::Square => ElementShape::square(),
            ElementKind::Cube => ElementShape::cube(),
            ElementKind::Triangle => ElementShape::triangle(),
            ElementKind::Tetrahedron => ElementShape::tetrahedron(),
            ElementKind::Wedge => ElementShape::triangular_prism(2),
        }
    }

    /// Computes basis weights and their xi derivatives at `xi`.
    /// weights: one per node
    /// derivatives: row-major `nodes x dim`
    pub fn basis(&self, xi: &[f64], weights: &mut [f64], derivatives: &mut [f64]) {
        let dim = self.dimension();
        match self {
            ElementKind::Line | ElementKind::Square | ElementKind::Cube => {
                for node in 0..self.number_of_nodes() {
                    let bit = |axis: usize| (node >> axis) & 1;
                    weights[node] = (0..dim).map(|axis| line_weight(bit(axis), xi[axis])).product();
                    for j in 0..dim {
                        derivatives[node * dim + j] = (0..dim)
                            .map(|axis| {
                                if axis == j {
                                    line_derivative(bit(axis))
                                } else {
                                    line_weight(bit(axis), xi[axis])
                                }
                            })
                            .product();
                    }
                }
            }
            ElementKind::Triangle | ElementKind::Tetrahedron => {
                for vertex in 0..self.number_of_nodes() {
                    weights[vertex] = simplex_weight(vertex, &xi[..dim]);
                    for j in 0..dim {
                        derivatives[vertex * dim + j] = simplex_derivative(vertex, j);
                    }
                }
            }
            ElementKind::Wedge => {
                let face = &xi[..2];
                for node in 0..6 {
                    let (vertex, layer) = (node % 3, node / 3);
                    let across = simplex_weight(vertex, face);
                    let along = line_weight(layer, xi[2]);
                    weights[node] = across * along;
                    derivatives[node * 3] = simplex_derivative(vertex, 0) * along;
                    derivatives[node * 3 + 1] = simplex_derivative(vertex, 1) * along;
                    derivatives[node * 3 + 2] = across * line_derivative(layer);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagrangeElement {
    pub kind: ElementKind,
    pub nodes: Vec<usize>,
}

/// Nodal values with `number_of_components` entries per node, interpolated
/// over linear elements.
#[derive(Debug, Clone)]
pub struct LagrangeMesh {
    number_of_components: usize,
    node_values: Vec<f64>,
    elements: Vec<LagrangeElement>,
}

impl LagrangeMesh {
    /// `node_values` holds the values of node 0, then node 1, and so on.
    pub fn new(number_of_components: usize, node_values: Vec<f64>) -> Result<Self> {
        if number_of_components == 0 {
            return Err(FindXiError::InvalidMesh(
                "number of components must be positive".to_string(),
            ));
        }
        if node_values.len() % number_of_components != 0 {
            return Err(FindXiError::InvalidMesh(format!(
                "{} node values is not a multiple of {} components",
                node_values.len(),
                number_of_components
            )));
        }
        if node_values.iter().any(|v| !v.is_finite()) {
            return Err(FindXiError::InvalidMesh(
                "node values must be finite".to_string(),
            ));
        }
        Ok(Self {
            number_of_components,
            node_values,
            elements: Vec::new(),
        })
    }

    pub fn number_of_nodes(&self) -> usize {
        self.node_values.len() / self.number_of_components
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, id: ElementId) -> Option<&LagrangeElement> {
        self.elements.get(id.0)
    }

    pub fn element_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        (0..self.elements.len()).map(ElementId)
    }

    pub fn add_element(&mut self, kind: ElementKind, nodes: &[usize]) -> Result<ElementId> {
        if nodes.len() != kind.number_of_nodes() {
            return Err(FindXiError::InvalidMesh(format!(
                "{:?} element needs {} nodes, got {}",
                kind,
                kind.number_of_nodes(),
                nodes.len()
            )));
        }
        let node_count = self.number_of_nodes();
        if let Some(node) = nodes.iter().find(|node| **node >= node_count) {
            return Err(FindXiError::InvalidMesh(format!(
                "node {} does not exist; mesh has {} nodes",
                node, node_count
            )));
        }
        self.elements.push(LagrangeElement {
            kind,
            nodes: nodes.to_vec(),
        });
        Ok(ElementId(self.elements.len() - 1))
    }

    pub fn node_values(&self, node: usize) -> Option<&[f64]> {
        (node < self.number_of_nodes()).then(|| self.nodal(node))
    }

    /// Node ids held by elements are checked in `add_element`.
    fn nodal(&self, node: usize) -> &[f64] {
        let start = node * self.number_of_components;
        &self.node_values[start..start + self.number_of_components]
    }

    /// Checks that `values` could replace the values of `node`.
    pub fn check_node_values(&self, node: usize, values: &[f64]) -> Result<()> {
        if node >= self.number_of_nodes() {
            return Err(FindXiError::InvalidMesh(format!("node {} does not exist", node)));
        }
        if values.len() != self.number_of_components {
            return Err(FindXiError::ComponentMismatch {
                expected: self.number_of_components,
                provided: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FindXiError::InvalidMesh(
                "node values must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn set_node_values(&mut self, node: usize, values: &[f64]) -> Result<()> {
        self.check_node_values(node, values)?;
        let start = node * self.number_of_components;
        self.node_values[start..start + self.number_of_components].copy_from_slice(values);
        Ok(())
    }

    /// Forward evaluation without derivatives.
    pub fn evaluate_at(&self, element: ElementId, xi: &[f64]) -> anyhow::Result<Vec<f64>> {
        let dim = self.element_dimension(element);
        let mut values = vec![0.0; self.number_of_components];
        let mut derivatives = vec![0.0; self.number_of_components * dim];
        self.evaluate(element, xi, 0.0, &mut values, &mut derivatives)?;
        Ok(values)
    }
}

impl Mesh for LagrangeMesh {
    type Element = ElementId;

    fn element_dimension(&self, element: ElementId) -> usize {
        self.element(element).map_or(0, |e| e.kind.dimension())
    }

    fn element_shape(&self, element: ElementId) -> ElementShape {
        self.element(element)
            .map_or_else(|| ElementShape::new(Vec::new()), |e| e.kind.shape())
    }
}

impl Field for LagrangeMesh {
    type Mesh = LagrangeMesh;

    fn mesh(&self) -> &LagrangeMesh {
        self
    }

    fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    fn evaluate(
        &self,
        element: ElementId,
        xi: &[f64],
        _time: f64,
        values: &mut [f64],
        derivatives: &mut [f64],
    ) -> anyhow::Result<()> {
        let lagrange = self
            .element(element)
            .ok_or_else(|| anyhow!("element {:?} does not exist", element))?;
        let dim = lagrange.kind.dimension();
        let components = self.number_of_components;
        if xi.len() != dim {
            bail!("xi has {} values for a {}-D element", xi.len(), dim);
        }
        if values.len() < components || derivatives.len() < components * dim {
            bail!("output buffers too small for {} components", components);
        }

        let mut weights = [0.0; MAXIMUM_ELEMENT_NODES];
        let mut basis_derivatives = [0.0; MAXIMUM_ELEMENT_NODES * MAXIMUM_DIMENSION];
        lagrange
            .kind
            .basis(xi, &mut weights, &mut basis_derivatives);

        values[..components].fill(0.0);
        derivatives[..components * dim].fill(0.0);
        for (n, node) in lagrange.nodes.iter().enumerate() {
            let node_values = self.nodal(*node);
            for k in 0..components {
                values[k] += weights[n] * node_values[k];
                for j in 0..dim {
                    derivatives[k * dim + j] += basis_derivatives[n * dim + j] * node_values[k];
                }
            }
        }
        Ok(())
    }

    fn element_range(&self, element: ElementId) -> Option<ValueRange> {
        let lagrange = self.element(element)?;
        ValueRange::from_samples(lagrange.nodes.iter().map(|node| self.nodal(*node)))
    }
}

/// Ordered set of element ids to search.
#[derive(Debug, Clone, Default)]
pub struct ElementList {
    order: Vec<ElementId>,
    members: HashSet<ElementId>,
}

impl ElementList {
    /// Builds a group keeping the first occurrence of each id.
    pub fn new(ids: impl IntoIterator<Item = ElementId>) -> Self {
        let mut list = Self::default();
        for id in ids {
            list.insert(id);
        }
        list
    }

    pub fn all(mesh: &LagrangeMesh) -> Self {
        Self::new(mesh.element_ids())
    }

    /// Appends `id` unless already present.
    pub fn insert(&mut self, id: ElementId) -> bool {
        if self.members.insert(id) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, id: ElementId) -> bool {
        if self.members.remove(&id) {
            self.order.retain(|member| *member != id);
            true
        } else {
            false
        }
    }

    pub fn ids(&self) -> &[ElementId] {
        &self.order
    }
}

impl ElementGroup<ElementId> for ElementList {
    fn contains(&self, element: ElementId) -> bool {
        self.members.contains(&element)
    }

    fn members(&self) -> Box<dyn Iterator<Item = ElementId> + '_> {
        Box::new(self.order.iter().copied())
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}
