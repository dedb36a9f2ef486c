pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const DIFFICULTY_INTERVAL: usize = 10;
pub const GENESIS_TIMESTAMP: &str = "01/01/2017";
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
