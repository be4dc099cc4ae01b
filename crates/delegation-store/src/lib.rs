mod api;
mod errors;
mod model;
mod store;

pub use api::DelegationStore;
pub use errors::StoreError;
pub use model::{GrantStatus, ResourceGrant, TaskGrant};
pub use store::InMemoryDelegationStore;
