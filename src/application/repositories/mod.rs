mod actor_repository;
mod calendar_repository;
mod support;

pub use actor_repository::ActorRepository;
pub use calendar_repository::CalendarRepository;
