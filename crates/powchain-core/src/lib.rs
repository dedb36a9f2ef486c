//! Append-only proof-of-work ledger: blocks bound to their predecessor by
//! SHA-256, mined against a leading-zero difficulty and checked for tampering.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod mine;
pub mod peers;

pub use block::{calculate_hash, Block, BlockCandidate, BlockMut};
pub use chain::Chain;
pub use config::ChainConfig;
pub use error::{ChainViolation, LedgerError};
pub use mine::MiningStats;
pub use peers::{PeerInsert, PeerNotifier, TracingNotifier};

pub mod pow {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    pub fn count_leading_zero_chars(hash: &str) -> usize {
        hash.bytes().take_while(|b| *b == b'0').count()
    }

    /// True when `hash` starts with at least `difficulty` `'0'` characters.
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        count_leading_zero_chars(hash) >= difficulty as usize
    }

    /// Stop signal for a running nonce search. Clones share the same flag.
    #[derive(Clone, Debug, Default)]
    pub struct CancelToken {
        cancelled: Arc<AtomicBool>,
    }

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.cancelled.store(true, Ordering::Relaxed);
        }

        pub fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::Relaxed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zero_chars_examples() {
        assert_eq!(pow::count_leading_zero_chars(""), 0);
        assert_eq!(pow::count_leading_zero_chars("abc"), 0);
        assert_eq!(pow::count_leading_zero_chars("0abc"), 1);
        assert_eq!(pow::count_leading_zero_chars("000f00"), 3);
        assert_eq!(pow::count_leading_zero_chars(&"0".repeat(64)), 64);
    }

    #[test]
    fn zero_difficulty_is_vacuous() {
        assert!(pow::meets_difficulty("ffff", 0));
        assert!(pow::meets_difficulty("", 0));
        assert!(!pow::meets_difficulty("0fff", 2));
        assert!(pow::meets_difficulty("00ff", 2));
    }

    #[test]
    fn cancel_token_clones_share_state() {
        let token = pow::CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
