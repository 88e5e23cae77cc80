//! Virtual function registry port.

use std::future::Future;

use fusehub_domain::virtual_function::VirtualFunctionDescriptor;

/// Looks up the virtual functions registered for a device category.
pub trait VirtualFunctionRegistry: Send + Sync {
    /// Descriptors for `category`, in registration order. Empty when the
    /// category has none.
    fn category_functions(
        &self,
        category: &str,
    ) -> impl Future<Output = Vec<VirtualFunctionDescriptor>> + Send;
}

impl<T: VirtualFunctionRegistry> VirtualFunctionRegistry for std::sync::Arc<T> {
    fn category_functions(
        &self,
        category: &str,
    ) -> impl Future<Output = Vec<VirtualFunctionDescriptor>> + Send {
        (**self).category_functions(category)
    }
}
