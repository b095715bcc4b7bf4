// Repositories - one per pipeline table

pub mod domain_repository;
pub mod unresolvable_repository;
pub mod wildcard_repository;

pub use domain_repository::DomainRepository;
pub use unresolvable_repository::UnresolvableRepository;
pub use wildcard_repository::WildcardRepository;
