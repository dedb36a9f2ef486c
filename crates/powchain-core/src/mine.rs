use crate::{
    constants::HASH_HEX_SIZE,
    pow::{meets_difficulty, CancelToken},
    Block, BlockCandidate, LedgerError,
};
use std::time::{Duration, Instant};
use tracing::info;

/// Diagnostics from one proof-of-work search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MiningStats {
    /// Number of hashes evaluated, including the first one.
    pub attempts: u64,
    pub elapsed: Duration,
}

impl BlockCandidate {
    /// Searches nonces upward from the current one until the hex hash starts
    /// with `difficulty` zeros, then freezes the candidate into a [`Block`].
    ///
    /// The current nonce is evaluated before any increment, so difficulty 0
    /// returns at once with the nonce untouched. The search has no time bound.
    pub fn mine(self, difficulty: u32) -> Result<(Block, MiningStats), LedgerError> {
        search(self, difficulty, None)
    }

    /// Like [`BlockCandidate::mine`], but checks `cancel` before every new nonce.
    pub fn mine_cancellable(
        self,
        difficulty: u32,
        cancel: &CancelToken,
    ) -> Result<(Block, MiningStats), LedgerError> {
        search(self, difficulty, Some(cancel))
    }
}

fn search(
    mut candidate: BlockCandidate,
    difficulty: u32,
    cancel: Option<&CancelToken>,
) -> Result<(Block, MiningStats), LedgerError> {
    if difficulty as usize > HASH_HEX_SIZE {
        return Err(LedgerError::DifficultyUnreachable {
            difficulty,
            max: HASH_HEX_SIZE,
        });
    }

    let start = Instant::now();
    let mut attempts = 1u64;
    let mut hash = candidate.calculate_hash();

    while !meets_difficulty(&hash, difficulty) {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(LedgerError::MiningCancelled {
                index: candidate.index,
                nonce: candidate.nonce,
            });
        }
        candidate.nonce = candidate
            .nonce
            .checked_add(1)
            .ok_or(LedgerError::NonceSpaceExhausted {
                index: candidate.index,
            })?;
        hash = candidate.calculate_hash();
        attempts += 1;
    }

    let stats = MiningStats {
        attempts,
        elapsed: start.elapsed(),
    };
    info!(
        index = candidate.index,
        nonce = candidate.nonce,
        attempts,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "Block mined: {}",
        hash
    );

    Ok((candidate.seal(hash), stats))
}
