use thiserror::Error;

/// Failures surfaced by block construction, mining and configuration.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The payload has no canonical JSON form, so it cannot be hashed.
    #[error("payload cannot be serialized: {0}")]
    Unserializable(#[from] serde_json::Error),

    #[error("chain cannot be rendered as JSON: {0}")]
    Render(#[source] serde_json::Error),

    #[error("difficulty {difficulty} exceeds the {max} hex characters of a digest")]
    DifficultyUnreachable { difficulty: u32, max: usize },

    #[error("nonce space exhausted while mining block {index}")]
    NonceSpaceExhausted { index: u64 },

    #[error("mining of block {index} cancelled at nonce {nonce}")]
    MiningCancelled { index: u64, nonce: u64 },

    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),
}

/// First integrity failure found by [`crate::chain::Chain::validate`].
///
/// `position` is the block's offset in the chain, which equals its index
/// whenever the chain was grown through `append` with correct sequencing.
///
/// [`ChainViolation::IndexGap`] is stricter than a hash and link check alone:
/// a chain whose hashes and links are all intact still fails here when a
/// block's index does not follow its predecessor's.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    /// Stored hash differs from the hash recomputed from the block's fields.
    #[error("block {position}: stored hash {stored} does not match recomputed {computed}")]
    HashMismatch {
        position: usize,
        stored: String,
        computed: String,
    },

    /// Stored previous hash differs from the predecessor's stored hash.
    #[error("block {position}: previous hash {found} does not link to {expected}")]
    LinkMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    /// Block index does not follow its predecessor's index. Raised even when
    /// the block's hash and previous hash are otherwise consistent.
    #[error("block {position}: index {found} does not follow {expected_after}")]
    IndexGap {
        position: usize,
        expected_after: u64,
        found: u64,
    },
}

impl ChainViolation {
    pub fn position(&self) -> usize {
        match self {
            ChainViolation::HashMismatch { position, .. }
            | ChainViolation::LinkMismatch { position, .. }
            | ChainViolation::IndexGap { position, .. } => *position,
        }
    }

    /// True for self-consistency failures, false for chain-consistency ones.
    pub fn is_self_consistency(&self) -> bool {
        matches!(self, ChainViolation::HashMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_names_the_chain() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let message = LedgerError::Render(cause).to_string();
        assert!(message.starts_with("chain cannot be rendered as JSON"));
        assert!(!message.contains("payload"));
    }
}
