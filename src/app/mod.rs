pub mod console;

pub use console::{AdminConsole, HttpOrchestrator};
