use thiserror::Error;

/// Errors surfaced to callers of the memory fabric.
///
/// Every operation reports its failure to the caller; there is no implicit
/// retry at the data plane. The only retry loop in the system is the
/// bounded peer-connect loop at startup.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Configured memory regions overlap at startup.
    #[error("configured memory regions overlap")]
    LayoutOverlap,

    /// The address is not covered by any allocated or free region.
    #[error("address {0:#x} is not mapped by any region")]
    Unmapped(u64),

    /// Offset plus length exceeds the containing buffer.
    #[error("range [{offset:#x}, +{len}) exceeds the {capacity}-byte buffer")]
    OutOfBounds { offset: u64, len: u64, capacity: u64 },

    /// No free region is large enough, locally or as an overflow target.
    #[error("no free region of at least {0} bytes")]
    NoCapacity(u64),

    /// Free was invoked on an address where no allocation begins.
    #[error("no allocation starts at {0:#x}")]
    NotAllocated(u64),

    /// An ownership transfer asked for more bytes than the mapped span holds.
    #[error("mapped span at {start:#x} holds {available} bytes, {requested} requested")]
    RangeTooSmall {
        start: u64,
        requested: u64,
        available: u64,
    },

    /// No transport handle is registered for the owning node.
    #[error("no transport registered for node {0}")]
    UnknownPeer(String),

    /// The RPC invocation itself failed: connection, encoding, or a
    /// non-success answer from the remote handler.
    #[error("rpc transport failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
