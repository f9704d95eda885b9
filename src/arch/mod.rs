//! Architecture-specific code for x86.

pub mod port;
