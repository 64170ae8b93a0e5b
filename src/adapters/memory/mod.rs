//! In-memory persistence adapters for development and tests.

mod log_repository;
mod policy_repository;
mod tenant_directory;

pub use log_repository::InMemoryLogRepository;
pub use policy_repository::InMemoryPolicyRepository;
pub use tenant_directory::InMemoryTenantDirectory;
