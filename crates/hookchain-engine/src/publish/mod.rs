//! Published effective chains and their deferred reclamation.
//!
//! Readers load chains lock-free from [`Publisher`]. Writers swap chains in
//! one (node, hook) at a time and hand the old ones to [`Reclaimer`], which
//! gives displaced programs back to the store only once no retired chain that
//! might still be in a reader's hands can reach them.

mod publisher;
mod reclaim;

pub use publisher::Publisher;
pub use reclaim::Reclaimer;
