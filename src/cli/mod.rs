pub mod input;
pub mod shell;
pub mod ui;

pub use input::{LineInput, stdin_lines};
pub use shell::Shell;
