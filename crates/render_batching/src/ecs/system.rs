//! System trait and implementations

/// System trait for processing entities and components
pub trait System {
    /// Per-run summary returned on success
    type Output;
    /// Error that aborts the run
    type Error: std::error::Error;

    /// Run the system
    fn run(&mut self, world: &mut crate::ecs::World) -> Result<Self::Output, Self::Error>;
}
