//! Identity resolution
//!
//! Every event, whether it came from the feed or from the live calendar,
//! is reduced to an [`Identity`](calrecon_domain::Identity) before any
//! decision is made about it.

pub mod batch;
pub mod resolver;

pub use batch::{Admission, BatchGuard};
pub use resolver::{resolve, signature, IdentityInputs};
