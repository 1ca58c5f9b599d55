pub mod cache;
pub mod error;
pub mod lagrange;
pub mod newton;
pub mod range;
pub mod search;
pub mod shape;
/// The `meshxi_core` crate inverts field evaluation over a finite element mesh:
/// given a target field value it finds an element and the xi (reference
/// coordinate) within it at which the field takes that value.
///
/// Key components:
/// - **Traits**: `Mesh`, `Field` and `ElementGroup`, the seams to mesh storage and field evaluation.
/// - **Shape**: classification of an element's xi domain as hypercube or (partly) simplex.
/// - **Newton**: per-element Gauss-Newton solve with domain-aware clamping.
/// - **Search / Cache**: group scan with a per-field result cache.
/// - **Lagrange**: a linear nodal-value field usable out of the box.
pub mod traits;

pub use cache::{find_element_xi, FieldLocator, FindXiCache};
pub use error::FindXiError;
pub use newton::{FindXiSettings, SearchMode};
pub use search::MeshLocation;
