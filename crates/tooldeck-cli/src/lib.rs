//! tooldeck CLI library surface; the `tooldeck` binary is a thin clap shell
//! over these commands.

pub mod commands;
