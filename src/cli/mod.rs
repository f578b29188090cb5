pub mod command;
pub mod fixup;
