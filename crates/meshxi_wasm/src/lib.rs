//! WASM bridge exposing mesh construction and find element xi to JavaScript.

mod locator;
mod search;

pub use locator::{ElementSpec, WasmMeshLocator};
pub use search::FindXiResult;
