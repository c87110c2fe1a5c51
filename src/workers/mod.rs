//! Worker types shipped with the crate.

pub mod command;
pub mod echo;

pub use command::{CommandWorker, CommandWorkerDef};
pub use echo::EchoWorker;
