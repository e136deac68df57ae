pub mod user_repo;
pub use user_repo::UserRepository;
pub mod unit_repo;
pub use unit_repo::UnitRepository;
pub mod container_repo;
pub use container_repo::ContainerRepository;
pub mod material_repo;
pub use material_repo::MaterialRepository;
pub mod social_repo;
pub use social_repo::SocialRepository;
