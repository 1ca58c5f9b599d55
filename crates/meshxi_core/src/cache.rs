//! Result cache and the public find element xi entry points.
//!
//! One [`FindXiCache`] belongs to one field. It remembers the last target and
//! the element/xi found for it (including "no element"), so repeated queries
//! for an unchanged target skip the search entirely.
//!
//! The cache is plain mutable state with no locking: concurrent searches on
//! the same field must be serialized by the caller or use separate caches.

use crate::error::{FindXiError, Result};
use crate::newton::FindXiSettings;
use crate::search::{search_group, MeshLocation};
use crate::traits::{ElementGroup, ElementOf, Field};

#[derive(Debug, Clone)]
pub struct FindXiCache<E> {
    valid: bool,
    values: Vec<f64>,
    element: Option<E>,
    xi: Vec<f64>,
    /// Settings the stored result was searched with.
    settings: Option<FindXiSettings>,
    /// Last element a search succeeded in; tried first on the next scan.
    last_found: Option<E>,
    hits: usize,
    misses: usize,
}

impl<E: Copy + Eq + std::fmt::Debug> FindXiCache<E> {
    pub fn new(number_of_values: usize) -> Self {
        Self {
            valid: false,
            values: vec![0.0; number_of_values],
            element: None,
            xi: Vec::new(),
            settings: None,
            last_found: None,
            hits: 0,
            misses: 0,
        }
    }

    pub fn number_of_values(&self) -> usize {
        self.values.len()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn last_found(&self) -> Option<E> {
        self.last_found
    }

    /// Forces the next query to search, keeping the element hint.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Forgets everything, including the element hint.
    pub fn clear(&mut self) {
        self.valid = false;
        self.element = None;
        self.xi.clear();
        self.last_found = None;
    }

    /// Drops storage and invalidates if the target dimension changed.
    fn resize(&mut self, number_of_values: usize) {
        if self.values.len() != number_of_values {
            log::debug!(
                "Find xi cache resized from {} to {} values",
                self.values.len(),
                number_of_values
            );
            self.valid = false;
            self.values = vec![0.0; number_of_values];
        }
    }

    /// A result searched under other settings is not reused.
    fn use_settings(&mut self, settings: &FindXiSettings) {
        if self.settings.as_ref() != Some(settings) {
            self.valid = false;
            self.settings = Some(*settings);
        }
    }

    /// Returns the cached result if it is still valid for `target` in `group`.
    /// Any mismatch invalidates the cache.
    fn lookup<G>(&mut self, target: &[f64], group: &G) -> Option<Option<MeshLocation<E>>>
    where
        G: ElementGroup<E> + ?Sized,
    {
        if self.valid {
            let element_ok = self.element.map_or(true, |element| group.contains(element));
            if !element_ok || self.values.as_slice() != target {
                self.valid = false;
            }
        }
        if !self.valid {
            return None;
        }
        Some(self.element.map(|element| MeshLocation {
            element,
            xi: self.xi.clone(),
        }))
    }

    fn store(&mut self, target: &[f64], location: Option<&MeshLocation<E>>) {
        self.values.copy_from_slice(target);
        match location {
            Some(location) => {
                self.element = Some(location.element);
                self.xi.clone_from(&location.xi);
                self.last_found = Some(location.element);
            }
            None => {
                self.element = None;
                self.xi.clear();
            }
        }
        self.valid = true;
    }
}

fn validate_target<F: Field + ?Sized>(field: &F, target: &[f64]) -> Result<()> {
    let expected = field.number_of_components();
    if expected == 0 {
        return Err(FindXiError::NoComponents);
    }
    if target.len() != expected {
        return Err(FindXiError::ComponentMismatch {
            expected,
            provided: target.len(),
        });
    }
    if let Some((component, value)) = target.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(FindXiError::NonFiniteTarget {
            component,
            value: *value,
        });
    }
    Ok(())
}

/// Finds an element of `group` and xi in it at which `field` evaluates to `target`.
///
/// Returns `Ok(None)` if no element matches; errors are reserved for invalid
/// input. The result, including a negative one, is stored in `cache` and
/// returned directly while the target, settings and group membership are
/// unchanged.
pub fn find_element_xi<F, G>(
    field: &F,
    cache: &mut FindXiCache<ElementOf<F>>,
    target: &[f64],
    group: &G,
    settings: &FindXiSettings,
) -> Result<Option<MeshLocation<ElementOf<F>>>>
where
    F: Field + ?Sized,
    G: ElementGroup<ElementOf<F>> + ?Sized,
{
    validate_target(field, target)?;
    settings.validate()?;

    cache.resize(target.len());
    cache.use_settings(settings);
    if let Some(cached) = cache.lookup(target, group) {
        cache.hits += 1;
        log::debug!("Find xi cache hit: {:?}", cached.as_ref().map(|l| l.element));
        return Ok(cached);
    }

    cache.misses += 1;
    let outcome = search_group(field, target, group, cache.last_found, settings);
    log::debug!(
        "Find xi searched {} of {} elements ({} skipped by range): {:?}",
        outcome.elements_tried,
        group.len(),
        outcome.elements_skipped,
        outcome.location.as_ref().map(|l| l.element)
    );
    cache.store(target, outcome.location.as_ref());
    Ok(outcome.location)
}

/// A field together with its search settings and lazily created cache.
///
/// Dropping the locator releases the cache.
pub struct FieldLocator<F: Field> {
    field: F,
    settings: FindXiSettings,
    cache: Option<FindXiCache<ElementOf<F>>>,
}

impl<F: Field> FieldLocator<F> {
    pub fn new(field: F) -> Self {
        Self::with_settings(field, FindXiSettings::default())
    }

    pub fn with_settings(field: F, settings: FindXiSettings) -> Self {
        Self {
            field,
            settings,
            cache: None,
        }
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    /// Mutable access to the field. Any change to the field can change search
    /// results, so the cache is dropped.
    pub fn field_mut(&mut self) -> &mut F {
        self.cache = None;
        &mut self.field
    }

    pub fn settings(&self) -> &FindXiSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: FindXiSettings) -> Result<()> {
        settings.validate()?;
        if settings != self.settings {
            self.settings = settings;
            if let Some(cache) = self.cache.as_mut() {
                cache.invalidate();
            }
        }
        Ok(())
    }

    pub fn cache(&self) -> Option<&FindXiCache<ElementOf<F>>> {
        self.cache.as_ref()
    }

    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    pub fn find_element_xi<G>(
        &mut self,
        target: &[f64],
        group: &G,
    ) -> Result<Option<MeshLocation<ElementOf<F>>>>
    where
        G: ElementGroup<ElementOf<F>> + ?Sized,
    {
        let number_of_values = self.field.number_of_components();
        let cache = self
            .cache
            .get_or_insert_with(|| FindXiCache::new(number_of_values));
        find_element_xi(&self.field, cache, target, group, &self.settings)
    }
}
