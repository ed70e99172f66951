pub mod diagnostics;
pub mod environment;
pub mod status;
