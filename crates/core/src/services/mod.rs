mod burner;
mod indexer;
mod processor;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use burner::{AutoBurner, BurnOutcome};
pub use indexer::{IndexerConfig, IndexerService};
pub use processor::{BlockProcessor, BlockSummary};
pub use transfer::TransferCall;
