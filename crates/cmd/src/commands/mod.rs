pub mod describe;
pub mod groupby;
pub mod sources;

pub use describe::describe_command;
pub use groupby::groupby_command;
pub use sources::sources_command;
