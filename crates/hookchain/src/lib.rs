//! Top-level facade crate for hookchain.
//!
//! Re-exports core types and the engine library so users can depend on a single crate.

pub mod core {
    pub use hookchain_core::*;
}

pub mod engine {
    pub use hookchain_engine::*;
}
