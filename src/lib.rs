
pub mod data;
pub mod sids;
pub mod tables;
pub mod miner;
pub mod io;

use tracing::*;

pub use data::{Item, Utility, SequenceId, Sequence, SequenceDatabase};
pub use sids::{SequenceIdList, SidRepresentation};
pub use tables::{RightTable, RightRow, LeftTable, LeftRow};
pub use miner::{RuleMiner, MinerParameters, MiningStatistics};
pub use io::{RuleSink, RuleRecord};

/// Used as intermediate representation for rule sides
pub type Itemvec = Vec<Item>;
