use tracing::info;

/// Receives one call per registered peer after every successful append.
///
/// Delivery is one-way: there is no acknowledgement or failure channel.
pub trait PeerNotifier {
    fn notify(&self, peer: &str);
}

impl<N: PeerNotifier + ?Sized> PeerNotifier for &N {
    fn notify(&self, peer: &str) {
        (**self).notify(peer)
    }
}

/// Default notifier: records the sync as a log event and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl PeerNotifier for TracingNotifier {
    fn notify(&self, peer: &str) {
        info!(peer, "Blockchain synced with peer");
    }
}

/// Outcome of registering a peer address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerInsert {
    Added,
    AlreadyPresent,
}
