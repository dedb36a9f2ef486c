use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DIFFICULTY, DIFFICULTY_INTERVAL, HASH_HEX_SIZE};
use crate::LedgerError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex characters required of the first mined block.
    pub initial_difficulty: u32,
    /// `adjust_difficulty` raises difficulty when the chain length is a multiple of this.
    pub difficulty_interval: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: DEFAULT_DIFFICULTY,
            difficulty_interval: DIFFICULTY_INTERVAL,
        }
    }
}

impl ChainConfig {
    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LedgerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty_interval == 0 {
            return Err(LedgerError::InvalidConfig(
                "difficulty_interval must be positive".into(),
            ));
        }
        if self.initial_difficulty as usize > HASH_HEX_SIZE {
            return Err(LedgerError::InvalidConfig(format!(
                "initial_difficulty {} exceeds digest length {}",
                self.initial_difficulty, HASH_HEX_SIZE
            )));
        }
        Ok(())
    }
}
