use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    constants::{GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP},
    peers::{PeerInsert, PeerNotifier, TracingNotifier},
    pow::CancelToken,
    Block, BlockCandidate, BlockMut, ChainConfig, ChainViolation, LedgerError, MiningStats,
};

/// Ordered, append-only sequence of blocks plus difficulty and peer registry.
///
/// `append` is the only way blocks enter the chain. Block 0 is the genesis
/// block built from the configuration and is never mined.
#[derive(Debug)]
pub struct Chain<N: PeerNotifier = TracingNotifier> {
    blocks: Vec<Block>,
    difficulty: u32,
    peers: Vec<String>,
    config: ChainConfig,
    notifier: N,
}

#[derive(Serialize)]
struct ChainSnapshot<'a> {
    chain: &'a [Block],
    difficulty: u32,
    peers: &'a [String],
}

/// The fixed first block. Its hash is whatever the fields produce; no
/// difficulty target applies.
pub fn create_genesis() -> Block {
    let mut candidate = BlockCandidate::from_value(
        0,
        GENESIS_TIMESTAMP,
        Value::String(GENESIS_PAYLOAD.to_string()),
    );
    candidate.previous_hash = GENESIS_PREVIOUS_HASH.to_string();
    Block::unmined(candidate)
}

impl Chain<TracingNotifier> {
    pub fn new(config: ChainConfig) -> Result<Self, LedgerError> {
        Self::with_notifier(config, TracingNotifier)
    }
}

impl Default for Chain<TracingNotifier> {
    fn default() -> Self {
        Self::assemble(ChainConfig::default(), TracingNotifier)
    }
}

impl<N: PeerNotifier> Chain<N> {
    pub fn with_notifier(config: ChainConfig, notifier: N) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self::assemble(config, notifier))
    }

    fn assemble(config: ChainConfig, notifier: N) -> Self {
        Self {
            blocks: vec![create_genesis()],
            difficulty: config.initial_difficulty,
            peers: Vec::new(),
            config,
            notifier,
        }
    }

    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds the genesis block")
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// A candidate whose index follows the current tip.
    pub fn next_candidate<P: Serialize + ?Sized>(
        &self,
        timestamp: impl Into<String>,
        payload: &P,
    ) -> Result<BlockCandidate, LedgerError> {
        BlockCandidate::new(self.latest_block().index() + 1, timestamp, payload)
    }

    /// Links `candidate` to the tip, mines it at the current difficulty,
    /// appends it and notifies every peer in registration order. The search
    /// always starts from nonce 0, whatever the caller left there.
    ///
    /// The candidate's index is trusted as given. A wrong index is not
    /// rejected here; `validate` reports it as an [`ChainViolation::IndexGap`].
    pub fn append(&mut self, candidate: BlockCandidate) -> Result<&Block, LedgerError> {
        let candidate = self.link(candidate);
        let (block, _stats) = candidate.mine(self.difficulty)?;
        Ok(self.commit(block))
    }

    /// Like [`Chain::append`] with a cancellable search. A cancelled search
    /// leaves the chain untouched and notifies nobody.
    pub fn append_cancellable(
        &mut self,
        candidate: BlockCandidate,
        cancel: &CancelToken,
    ) -> Result<(&Block, MiningStats), LedgerError> {
        let candidate = self.link(candidate);
        let (block, stats) = candidate.mine_cancellable(self.difficulty, cancel)?;
        Ok((self.commit(block), stats))
    }

    fn link(&self, mut candidate: BlockCandidate) -> BlockCandidate {
        candidate.previous_hash = self.latest_block().hash().to_string();
        candidate.nonce = 0;
        info!(
            index = candidate.index,
            difficulty = self.difficulty,
            "Starting mining process"
        );
        candidate
    }

    fn commit(&mut self, block: Block) -> &Block {
        self.blocks.push(block);
        self.sync_peers();
        self.latest_block()
    }

    fn sync_peers(&self) {
        info!(peers = self.peers.len(), "Syncing blockchain with peers");
        for peer in &self.peers {
            self.notifier.notify(peer);
        }
    }

    /// Checks every block after genesis, stopping at the first failure.
    ///
    /// Per block: the stored hash must match the recomputed one, the index
    /// must follow the predecessor's, and the previous hash must equal the
    /// predecessor's stored hash. Genesis itself is never checked.
    pub fn validate(&self) -> Result<(), ChainViolation> {
        for (position, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let position = position + 1;

            let computed = current.calculate_hash();
            if current.hash() != computed {
                warn!(position, "Invalid block hash detected");
                return Err(ChainViolation::HashMismatch {
                    position,
                    stored: current.hash().to_string(),
                    computed,
                });
            }

            if previous.index().checked_add(1) != Some(current.index()) {
                warn!(position, "Block index out of sequence");
                return Err(ChainViolation::IndexGap {
                    position,
                    expected_after: previous.index(),
                    found: current.index(),
                });
            }

            if current.previous_hash() != previous.hash() {
                warn!(position, "Invalid previous block hash detected");
                return Err(ChainViolation::LinkMismatch {
                    position,
                    expected: previous.hash().to_string(),
                    found: current.previous_hash().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Registers a peer address. A repeated address is left as is and
    /// reported as [`PeerInsert::AlreadyPresent`].
    pub fn add_peer(&mut self, address: impl Into<String>) -> PeerInsert {
        let address = address.into();
        if self.peers.contains(&address) {
            warn!(peer = %address, "Peer already exists");
            return PeerInsert::AlreadyPresent;
        }
        info!(peer = %address, "Peer added");
        self.peers.push(address);
        PeerInsert::Added
    }

    /// Raises difficulty by one when the chain length is a multiple of the
    /// configured interval. Returns whether it changed.
    pub fn adjust_difficulty(&mut self) -> bool {
        let len = self.blocks.len();
        debug!(len, interval = self.config.difficulty_interval, "Checking difficulty");
        if len == 0 || len % self.config.difficulty_interval != 0 {
            return false;
        }
        self.difficulty += 1;
        info!(difficulty = self.difficulty, "Difficulty increased");
        true
    }

    /// Unchecked write access to the block at `position`. Bypasses every
    /// invariant; `validate` is the only thing that will notice.
    pub fn block_mut_unchecked(&mut self, position: usize) -> Option<BlockMut<'_>> {
        self.blocks.get_mut(position).map(BlockMut::new)
    }

    pub fn to_json_pretty(&self) -> Result<String, LedgerError> {
        let snapshot = ChainSnapshot {
            chain: &self.blocks,
            difficulty: self.difficulty,
            peers: &self.peers,
        };
        serde_json::to_string_pretty(&snapshot).map_err(LedgerError::Render)
    }
}

impl<N: PeerNotifier> fmt::Display for Chain<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Chain: {} blocks, difficulty {}",
            self.blocks.len(),
            self.difficulty
        )?;
        if self.peers.is_empty() {
            writeln!(f, "Peers: (none)")?;
        } else {
            writeln!(f, "Peers: {}", self.peers.join(", "))?;
        }
        for block in &self.blocks {
            writeln!(f)?;
            writeln!(f, "Block #{} [{}]", block.index(), block.timestamp())?;
            writeln!(f, "  payload:  {}", block.payload())?;
            writeln!(f, "  previous: {}", block.previous_hash())?;
            writeln!(f, "  hash:     {}", block.hash())?;
            writeln!(f, "  nonce:    {}", block.nonce())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl PeerNotifier for Recorder {
        fn notify(&self, peer: &str) {
            self.calls.borrow_mut().push(peer.to_string());
        }
    }

    fn easy_config() -> ChainConfig {
        ChainConfig {
            initial_difficulty: 1,
            ..ChainConfig::default()
        }
    }

    fn grow(chain: &mut Chain<impl PeerNotifier>, amounts: &[u64]) {
        for amount in amounts {
            let candidate = chain
                .next_candidate("10/07/2017", &json!({ "amount": amount }))
                .unwrap();
            chain.append(candidate).unwrap();
        }
    }

    #[test]
    fn genesis_block_example() {
        let chain = Chain::default();
        let genesis = chain.latest_block();
        assert_eq!(chain.len(), 1);
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), "0");
        assert_eq!(genesis.timestamp(), "01/01/2017");
        assert_eq!(genesis.payload(), &json!("Genesis Block"));
        assert_eq!(genesis.nonce(), 0);
        assert!(genesis.is_self_consistent());
        assert_eq!(chain.difficulty(), 4);
    }

    #[test]
    fn genesis_is_deterministic() {
        assert_eq!(create_genesis(), create_genesis());
        let easy = Chain::new(easy_config()).unwrap();
        assert_eq!(easy.blocks()[0], Chain::default().blocks()[0]);
    }

    #[test]
    fn append_links_and_mines() {
        let mut chain = Chain::new(easy_config()).unwrap();
        grow(&mut chain, &[4, 10]);
        let blocks = chain.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].previous_hash(), blocks[0].hash());
        assert_eq!(blocks[2].previous_hash(), blocks[1].hash());
        assert!(blocks[1].hash().starts_with('0'));
        assert!(blocks[2].hash().starts_with('0'));
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn append_notifies_peers_in_order() {
        let recorder = Recorder::default();
        let mut chain = Chain::with_notifier(easy_config(), &recorder).unwrap();
        chain.add_peer("B");
        chain.add_peer("A");
        grow(&mut chain, &[1]);
        assert_eq!(*recorder.calls.borrow(), vec!["B", "A"]);
        grow(&mut chain, &[2]);
        assert_eq!(recorder.calls.borrow().len(), 4);
    }

    #[test]
    fn duplicate_peer_reported() {
        let mut chain = Chain::default();
        assert_eq!(chain.add_peer("A"), PeerInsert::Added);
        assert_eq!(chain.add_peer("A"), PeerInsert::AlreadyPresent);
        assert_eq!(chain.peers(), ["A".to_string()]);
    }

    #[test]
    fn cancelled_append_leaves_chain_untouched() {
        let recorder = Recorder::default();
        let config = ChainConfig {
            initial_difficulty: 64,
            ..ChainConfig::default()
        };
        let mut chain = Chain::with_notifier(config, &recorder).unwrap();
        chain.add_peer("A");
        let token = CancelToken::new();
        token.cancel();
        let candidate = chain.next_candidate("t", &1).unwrap();
        let err = chain.append_cancellable(candidate, &token).unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled { index: 1, .. }));
        assert_eq!(chain.len(), 1);
        assert!(recorder.calls.borrow().is_empty());
    }

    #[test]
    fn adjust_difficulty_only_on_interval() {
        let mut chain = Chain::new(ChainConfig {
            initial_difficulty: 0,
            difficulty_interval: 3,
            ..ChainConfig::default()
        })
        .unwrap();
        assert!(!chain.adjust_difficulty());
        grow(&mut chain, &[1]);
        assert!(!chain.adjust_difficulty());
        assert_eq!(chain.difficulty(), 0);
        grow(&mut chain, &[2]);
        assert_eq!(chain.len(), 3);
        assert!(chain.adjust_difficulty());
        assert_eq!(chain.difficulty(), 1);
        // Calling again at the same length raises it again; the check is
        // purely on length.
        assert!(chain.adjust_difficulty());
        assert_eq!(chain.difficulty(), 2);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = ChainConfig {
            difficulty_interval: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(
            Chain::new(config),
            Err(LedgerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn genesis_tamper_is_not_checked() {
        let mut chain = Chain::new(easy_config()).unwrap();
        chain
            .block_mut_unchecked(0)
            .unwrap()
            .set_payload(json!("Forged Genesis"));
        // Only block 0 exists, so nothing is scanned.
        assert!(chain.is_valid());
    }

    #[test]
    fn json_rendering_contains_state() {
        let mut chain = Chain::new(easy_config()).unwrap();
        chain.add_peer("Peer1-Node");
        grow(&mut chain, &[4]);
        let rendered: serde_json::Value =
            serde_json::from_str(&chain.to_json_pretty().unwrap()).unwrap();
        assert_eq!(rendered["difficulty"], json!(1));
        assert_eq!(rendered["peers"], json!(["Peer1-Node"]));
        assert_eq!(rendered["chain"][1]["payload"], json!({ "amount": 4 }));
        assert_eq!(rendered["chain"][1]["hash"], json!(chain.blocks()[1].hash()));
    }

    #[test]
    fn display_lists_blocks_and_peers() {
        let mut chain = Chain::new(easy_config()).unwrap();
        let text = chain.to_string();
        assert!(text.contains("Peers: (none)"));
        chain.add_peer("Peer1-Node");
        grow(&mut chain, &[4]);
        let text = chain.to_string();
        assert!(text.contains("Chain: 2 blocks, difficulty 1"));
        assert!(text.contains("Peers: Peer1-Node"));
        assert!(text.contains("Block #1 [10/07/2017]"));
        assert!(text.contains(r#"payload:  {"amount":4}"#));
    }
}
