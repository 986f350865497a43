// cartograph/src/core/mod.rs
pub mod condition;
pub mod control;
pub mod meta;
pub mod object;

pub use condition::{Condition, ConditionStatus};
pub use control::{until_cancelled, ReconcileOutcome, ReconcileRequest};
pub use meta::ObjectMeta;
pub use object::{ObjectKey, ObjectKind, OwnerReference, UnstructuredObject};
