pub mod cli;
pub mod coordinator;
pub mod logging;
pub mod store;
pub mod tui;
pub mod types;

// Re-export key types and functions at the crate root
pub use coordinator::{RecordParser, ScanCoordinator, TaggedLineParser};
pub use store::{ScanStore, ScanView};
pub use tui::{TuiApp, init_terminal, restore_terminal};
pub use types::{HandshakeRecord, ScanPhase, StoreEvent};
pub use logging::{init_logging, get_log_file_path};
