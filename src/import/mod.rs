pub mod historical;
pub mod players;
pub mod progress;
pub mod reference;

pub use historical::{HistoricalImportPipeline, LeagueFileLocation};
pub use players::{BatchImporter, ImportOptions, ImportSettings};
pub use progress::{CancelToken, ImportProgress};
pub use reference::sync_reference;
