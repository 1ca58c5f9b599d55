use crate::range::ValueRange;
use crate::shape::ElementShape;
use std::fmt::Debug;

/// Storage of elements and their shape metadata.
pub trait Mesh {
    /// Lightweight handle naming an element. Holding a handle does not keep the
    /// element alive; a stale handle simply stops being a member of any group.
    type Element: Copy + Eq + Debug;

    /// Returns the number of xi directions of the element.
    fn element_dimension(&self, element: Self::Element) -> usize;

    /// Returns the shape of the element's reference domain.
    fn element_shape(&self, element: Self::Element) -> ElementShape;
}

/// A vector valued field defined over the elements of a mesh.
pub trait Field {
    type Mesh: Mesh;

    fn mesh(&self) -> &Self::Mesh;

    /// Number of values produced by one evaluation.
    fn number_of_components(&self) -> usize;

    /// Evaluates the field at `xi` in `element`.
    /// values: buffer for the `N` field values
    /// derivatives: buffer for the row-major `N x dim` matrix of d(value)/d(xi)
    fn evaluate(
        &self,
        element: ElementOf<Self>,
        xi: &[f64],
        time: f64,
        values: &mut [f64],
        derivatives: &mut [f64],
    ) -> anyhow::Result<()>;

    /// Bounds of the field over the element, if cheaply known. Used to skip
    /// elements that cannot contain a target value.
    fn element_range(&self, _element: ElementOf<Self>) -> Option<ValueRange> {
        None
    }
}

/// The element handle type of a field's mesh.
pub type ElementOf<F> = <<F as Field>::Mesh as Mesh>::Element;

/// An ordered subset of mesh elements to search over.
pub trait ElementGroup<E> {
    fn contains(&self, element: E) -> bool;

    /// Iterates the members in the group's natural order, from the start.
    fn members(&self) -> Box<dyn Iterator<Item = E> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A slice searches its elements in order; a one-element slice restricts the
/// search to that element.
impl<E: Copy + PartialEq> ElementGroup<E> for [E] {
    fn contains(&self, element: E) -> bool {
        self.iter().any(|member| *member == element)
    }

    fn members(&self) -> Box<dyn Iterator<Item = E> + '_> {
        Box::new(self.iter().copied())
    }

    fn len(&self) -> usize {
        <[E]>::len(self)
    }
}
