//! Game rule implementations.

pub mod othello;
