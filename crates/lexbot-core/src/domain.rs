use std::{borrow::Borrow, fmt};

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Identifier for a class of request; the join key between classifier output and
/// registry entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityKey(&'static str);

impl CapabilityKey {
    pub const CASE_LAW_SCHOLAR: Self = Self("case_law_scholar");
    pub const MEMO_DRAFTER: Self = Self("memo_drafter");
    pub const FILE_CONVERSION: Self = Self("file_conversion");
    pub const N8N_SCHEDULER: Self = Self("n8n_scheduler");
    pub const HELP: Self = Self("help");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// `&'static str` hashes exactly like `str`, so map lookups by name are consistent.
impl Borrow<str> for CapabilityKey {
    fn borrow(&self) -> &str {
        self.0
    }
}
