//! Mesh locator wrapper: construction, settings and search group.

use anyhow::{bail, Context, Result};
use meshxi_core::lagrange::{ElementId, ElementKind, ElementList, LagrangeMesh};
use meshxi_core::{FieldLocator, FindXiSettings};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Element description as sent from JS: `{ kind: "triangle", nodes: [0, 1, 2] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSpec {
    pub kind: ElementKind,
    pub nodes: Vec<usize>,
}

pub(crate) fn build_mesh(
    number_of_components: usize,
    node_values: Vec<f64>,
    elements: &[ElementSpec],
) -> Result<LagrangeMesh> {
    let mut mesh = LagrangeMesh::new(number_of_components, node_values)
        .context("Failed to create mesh")?;
    for (index, spec) in elements.iter().enumerate() {
        mesh.add_element(spec.kind, &spec.nodes)
            .with_context(|| format!("Invalid element {}", index))?;
    }
    Ok(mesh)
}

pub(crate) fn build_group(mesh: &LagrangeMesh, element_ids: &[u32]) -> Result<ElementList> {
    let count = mesh.number_of_elements();
    let mut group = ElementList::default();
    for id in element_ids {
        let id = *id as usize;
        if id >= count {
            bail!("Element {} does not exist; mesh has {} elements.", id, count);
        }
        group.insert(ElementId(id));
    }
    Ok(group)
}

/// Rejected edits leave the field and its cache untouched.
pub(crate) fn update_node_values(
    locator: &mut FieldLocator<LagrangeMesh>,
    node: usize,
    values: &[f64],
) -> Result<()> {
    locator
        .field()
        .check_node_values(node, values)
        .with_context(|| format!("Invalid values for node {}", node))?;
    locator.field_mut().set_node_values(node, values)?;
    Ok(())
}

pub(crate) fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}

#[wasm_bindgen]
pub struct WasmMeshLocator {
    pub(crate) locator: FieldLocator<LagrangeMesh>,
    pub(crate) group: ElementList,
}

#[wasm_bindgen]
impl WasmMeshLocator {
    /// node_values: `number_of_components` values per node, node after node
    /// elements: array of `{ kind, nodes }`
    #[wasm_bindgen(constructor)]
    pub fn new(
        number_of_components: u32,
        node_values: Vec<f64>,
        elements: JsValue,
    ) -> Result<WasmMeshLocator, JsValue> {
        console_error_panic_hook::set_once();

        let specs: Vec<ElementSpec> = from_value(elements)
            .map_err(|e| JsValue::from_str(&format!("Invalid elements: {}", e)))?;
        let mesh = build_mesh(number_of_components as usize, node_values, &specs)
            .map_err(to_js_error)?;
        let group = ElementList::all(&mesh);

        Ok(WasmMeshLocator {
            locator: FieldLocator::new(mesh),
            group,
        })
    }

    pub fn number_of_elements(&self) -> u32 {
        self.locator.field().number_of_elements() as u32
    }

    pub fn get_settings(&self) -> Result<JsValue, JsValue> {
        to_value(self.locator.settings())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn set_settings(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let settings: FindXiSettings = from_value(settings)
            .map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))?;
        self.locator
            .set_settings(settings)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Restricts searches to the given elements, tried in the given order.
    pub fn set_search_group(&mut self, element_ids: Vec<u32>) -> Result<(), JsValue> {
        self.group = build_group(self.locator.field(), &element_ids).map_err(to_js_error)?;
        Ok(())
    }

    /// Searches every element again, in mesh order.
    pub fn reset_search_group(&mut self) {
        self.group = ElementList::all(self.locator.field());
    }

    pub fn set_node_values(&mut self, node: u32, values: Vec<f64>) -> Result<(), JsValue> {
        update_node_values(&mut self.locator, node as usize, &values).map_err(to_js_error)
    }

    pub fn clear_cache(&mut self) {
        self.locator.clear_cache();
    }

    pub fn cache_hits(&self) -> u32 {
        self.locator.cache().map_or(0, |cache| cache.hits()) as u32
    }

    pub fn cache_misses(&self) -> u32 {
        self.locator.cache().map_or(0, |cache| cache.misses()) as u32
    }
}
