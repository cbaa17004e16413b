//! Live board core: the token store, the simulated update feed with its
//! flash clearing, the fetch poller, and the derived views.

pub mod fetcher;
pub mod flash;
pub mod format;
pub mod simulator;
pub mod store;
pub mod view;

pub use fetcher::{FetchPoller, FetchPollerConfig, FetchStatus};
pub use simulator::{SimulatedUpdateDriver, SimulatorConfig};
pub use store::{StoreEvent, TokenStore};
pub use view::{partition_by_stage, sort_tokens, SortDirection, SortKey, StagePartition};
