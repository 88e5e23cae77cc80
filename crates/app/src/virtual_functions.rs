//! In-memory virtual function registry, populated from configuration.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use fusehub_domain::error::ValidationError;
use fusehub_domain::virtual_function::VirtualFunctionDescriptor;

use crate::ports::VirtualFunctionRegistry;

/// Descriptors grouped by device category, in registration order.
#[derive(Debug, Default)]
pub struct InMemoryVirtualFunctionRegistry {
    by_category: RwLock<HashMap<String, Vec<VirtualFunctionDescriptor>>>,
}

impl InMemoryVirtualFunctionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyFunctionKey`] for the first descriptor
    /// without a key.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = VirtualFunctionDescriptor>,
    ) -> Result<Self, ValidationError> {
        let registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Add a descriptor under its category. A descriptor with the same key
    /// in the same category replaces the previous one in place.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyFunctionKey`] when the key is empty.
    pub fn register(&self, descriptor: VirtualFunctionDescriptor) -> Result<(), ValidationError> {
        descriptor.validate()?;
        let mut by_category = self
            .by_category
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let functions = by_category.entry(descriptor.category.clone()).or_default();
        match functions.iter_mut().find(|vf| vf.key == descriptor.key) {
            Some(existing) => *existing = descriptor,
            None => functions.push(descriptor),
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_category
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VirtualFunctionRegistry for InMemoryVirtualFunctionRegistry {
    fn category_functions(
        &self,
        category: &str,
    ) -> impl Future<Output = Vec<VirtualFunctionDescriptor>> + Send {
        let functions = self
            .by_category
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .cloned()
            .unwrap_or_default();
        async move { functions }
    }
}
