//! Convenience re-exports for binaries registering typed-OpenAPI operations.

pub use crate::binding::{Binding, FieldOptions, Location, ParameterMeta};
pub use crate::document::{DocumentFormat, DocumentOptions};
pub use crate::operation::{Operation, OperationOptions};
pub use crate::output::{json_response, OperationOutput};
pub use crate::register::OpenApiScope;
