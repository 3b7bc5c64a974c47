//! Module resolution, name binding and evaluation for KCL programs.

pub mod diagnostics;
pub mod language;
pub mod project;
pub mod resolve;
pub mod runtime;

#[cfg(test)]
mod tests;
