//! Capability contract.
//!
//! A capability handles one class of user intent. It either answers right away or hands
//! back a future the router awaits; the two shapes are distinct variants, so the router's
//! normalization is an exhaustive match instead of runtime probing.

use std::{fmt, future::Future, pin::Pin};

use crate::Result;

/// A reply that is not available yet.
pub type PendingReply = Pin<Box<dyn Future<Output = Result<String>> + Send + 'static>>;

pub enum Reply {
    Immediate(String),
    Pending(PendingReply),
}

impl Reply {
    pub fn pending(fut: impl Future<Output = Result<String>> + Send + 'static) -> Self {
        Reply::Pending(Box::pin(fut))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Reply::Pending(_))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Immediate(s) => f.debug_tuple("Immediate").field(s).finish(),
            Reply::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Handler for one capability key.
///
/// Implementations hold only shared handles (LLM client, index handle, HTTP client) and
/// must tolerate concurrent `run` calls; the router places no lock around them. A pending
/// reply must own everything it needs (`'static`), typically clones of `Arc` handles.
pub trait Capability: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &'static str;

    fn run(&self, query: &str) -> Result<Reply>;
}
