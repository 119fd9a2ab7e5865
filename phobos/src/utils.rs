/// Image format handling and the frame encoding pipeline.
pub mod image;
/// Structured logging set-up for the binaries.
pub mod logging;
/// Test helpers: file path macros and recording test doubles.
pub mod tests;
