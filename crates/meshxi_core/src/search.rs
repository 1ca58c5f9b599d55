//! Element search driver.
//!
//! Runs the per-element solver over a group: the hint element (the last one
//! found) first, then every member in group order. The first element that
//! converges wins. When searching for the nearest location, an element that
//! does not converge still offers its final clamped xi, and the one closest to
//! the target is kept.

use crate::newton::{ElementXiSolver, FindXiSettings, SearchMode, Termination};
use crate::traits::{ElementGroup, ElementOf, Field, Mesh};
use serde::{Deserialize, Serialize};

/// Converged xi can sit a few tolerances outside the element along every xi
/// direction, moving a linear field up to that far past its nodal range.
const RANGE_PADDING_PER_DIMENSION: f64 = 4.0;

/// An element and the xi within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshLocation<E> {
    pub element: E,
    pub xi: Vec<f64>,
}

/// Outcome of a scan, with the number of elements the solver was run on.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome<E> {
    pub location: Option<MeshLocation<E>>,
    pub elements_tried: usize,
    pub elements_skipped: usize,
}

/// Searches `group` for an element and xi at which `field` equals `target`.
///
/// A search that finds nothing returns `location: None`; that is a normal
/// result when the target is outside the range of the field over the group.
/// In [`SearchMode::Nearest`] a location is returned whenever any element could
/// be evaluated.
pub fn search_group<F, G>(
    field: &F,
    target: &[f64],
    group: &G,
    hint: Option<ElementOf<F>>,
    settings: &FindXiSettings,
) -> SearchOutcome<ElementOf<F>>
where
    F: Field + ?Sized,
    G: ElementGroup<ElementOf<F>> + ?Sized,
{
    let mut solver = ElementXiSolver::new(field, target, *settings);
    let mut outcome = SearchOutcome {
        location: None,
        elements_tried: 0,
        elements_skipped: 0,
    };
    let nearest_mode = settings.search_mode == SearchMode::Nearest;
    let mut nearest: Option<(MeshLocation<ElementOf<F>>, f64)> = None;

    let hint = hint.filter(|element| group.contains(*element));
    let candidates = hint.into_iter().chain(
        group
            .members()
            .filter(move |element| Some(*element) != hint),
    );

    for element in candidates {
        if let Some(dim) = settings.element_dimension {
            if field.mesh().element_dimension(element) != dim {
                outcome.elements_skipped += 1;
                continue;
            }
        }
        if settings.use_value_ranges
            && !nearest_mode
            && !range_may_contain(field, element, solver.target(), settings)
        {
            outcome.elements_skipped += 1;
            continue;
        }
        outcome.elements_tried += 1;
        let solution = solver.solve(element);
        if solution.converged {
            log::trace!(
                "Found element {:?} xi {:?} after {} steps",
                element,
                solution.xi,
                solution.steps
            );
            outcome.location = Some(MeshLocation {
                element,
                xi: solution.xi,
            });
            return outcome;
        }
        log::trace!("Element {:?} rejected: {:?}", element, solution.termination);

        if nearest_mode && offers_nearest(solution.termination) {
            if let Some((xi, distance)) = solver.distance_at(element, solution.xi) {
                if nearest.as_ref().map_or(true, |(_, best)| distance < *best) {
                    nearest = Some((MeshLocation { element, xi }, distance));
                }
            }
        }
    }

    if let Some((location, distance)) = nearest {
        log::trace!(
            "Nearest element {:?} xi {:?} at distance {}",
            location.element,
            location.xi,
            distance
        );
        outcome.location = Some(location);
    }
    outcome
}

/// Terminations that leave a usable xi in the element.
fn offers_nearest(termination: Termination) -> bool {
    matches!(
        termination,
        Termination::Stalled
            | Termination::IterationLimit
            | Termination::Singular
            | Termination::ResidualMismatch
    )
}

fn range_may_contain<F: Field + ?Sized>(
    field: &F,
    element: ElementOf<F>,
    target: &[f64],
    settings: &FindXiSettings,
) -> bool {
    field.element_range(element).map_or(true, |range| {
        let dim = field.mesh().element_dimension(element).max(1) as f64;
        range.contains(target, RANGE_PADDING_PER_DIMENSION * dim * settings.tolerance)
    })
}
