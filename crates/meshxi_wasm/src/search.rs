//! Find element xi and forward evaluation entry points.

use crate::locator::{to_js_error, WasmMeshLocator};
use anyhow::{bail, Result};
use js_sys::Float64Array;
use meshxi_core::lagrange::{ElementId, LagrangeMesh};
use meshxi_core::MeshLocation;
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// Search result sent to JS. `element` is null when no element matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindXiResult {
    pub element: Option<usize>,
    pub xi: Vec<f64>,
}

impl From<Option<MeshLocation<ElementId>>> for FindXiResult {
    fn from(location: Option<MeshLocation<ElementId>>) -> Self {
        match location {
            Some(location) => Self {
                element: Some(location.element.0),
                xi: location.xi,
            },
            None => Self {
                element: None,
                xi: Vec::new(),
            },
        }
    }
}

pub(crate) fn evaluate_element(mesh: &LagrangeMesh, element: usize, xi: &[f64]) -> Result<Vec<f64>> {
    if element >= mesh.number_of_elements() {
        bail!(
            "Element {} does not exist; mesh has {} elements.",
            element,
            mesh.number_of_elements()
        );
    }
    mesh.evaluate_at(ElementId(element), xi)
}

#[wasm_bindgen]
impl WasmMeshLocator {
    /// Returns `{ element, xi }` for the first element of the search group in
    /// which the field equals `values`, or `{ element: null, xi: [] }`.
    pub fn find_element_xi(&mut self, values: Vec<f64>) -> Result<JsValue, JsValue> {
        let location = self
            .locator
            .find_element_xi(&values, &self.group)
            .map_err(|e| JsValue::from_str(&format!("Find element xi failed: {}", e)))?;
        to_value(&FindXiResult::from(location))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn evaluate(&self, element: u32, xi: Vec<f64>) -> Result<Float64Array, JsValue> {
        let values =
            evaluate_element(self.locator.field(), element as usize, &xi).map_err(to_js_error)?;
        Ok(Float64Array::from(values.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{build_group, build_mesh, ElementSpec};
    use meshxi_core::lagrange::ElementKind;
    use meshxi_core::{FieldLocator, FindXiSettings};
    use wasm_bindgen_test::wasm_bindgen_test;

    fn unit_triangles() -> LagrangeMesh {
        let specs = vec![
            ElementSpec {
                kind: ElementKind::Triangle,
                nodes: vec![0, 1, 2],
            },
            ElementSpec {
                kind: ElementKind::Triangle,
                nodes: vec![3, 2, 1],
            },
        ];
        build_mesh(2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &specs).expect("mesh")
    }

    #[test]
    fn result_from_location_and_from_none() {
        let found = FindXiResult::from(Some(MeshLocation {
            element: ElementId(1),
            xi: vec![0.25, 0.5],
        }));
        assert_eq!(found.element, Some(1));
        assert_eq!(found.xi, vec![0.25, 0.5]);
        let missing = FindXiResult::from(None);
        assert_eq!(missing.element, None);
        assert!(missing.xi.is_empty());
    }

    #[test]
    fn evaluate_element_checks_id() {
        let mesh = unit_triangles();
        let values = evaluate_element(&mesh, 1, &[0.25, 0.25]).expect("evaluate");
        assert!((values[0] - 0.75).abs() < 1e-12);
        assert!((values[1] - 0.75).abs() < 1e-12);
        assert!(evaluate_element(&mesh, 2, &[0.25, 0.25]).is_err());
    }

    #[wasm_bindgen_test]
    fn locator_finds_upper_triangle() {
        let mesh = unit_triangles();
        let group = build_group(&mesh, &[0, 1]).expect("group");
        let mut wasm = WasmMeshLocator {
            locator: FieldLocator::with_settings(mesh, FindXiSettings::default()),
            group,
        };
        let result = wasm.find_element_xi(vec![0.75, 0.75]).expect("search");
        assert!(result.is_object());
        wasm.find_element_xi(vec![0.75, 0.75]).expect("search");
        assert_eq!(wasm.cache_hits(), 1);
        assert_eq!(wasm.cache_misses(), 1);
    }

    #[wasm_bindgen_test]
    fn locator_rejects_wrong_component_count() {
        let mesh = unit_triangles();
        let group = build_group(&mesh, &[0]).expect("group");
        let mut wasm = WasmMeshLocator {
            locator: FieldLocator::new(mesh),
            group,
        };
        let message = wasm
            .find_element_xi(vec![0.5])
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("Find element xi failed"));
    }
}
