pub mod events;
pub mod journal;
pub mod script;
pub mod sequencer;
pub mod shared;
pub mod state;
pub mod store;

pub use events::{Notification, RegistryEvent, StoreEvent};
pub use journal::{Journal, JournalEntry};
pub use script::{execute_script, Command, CommandOutput};
pub use sequencer::Aggregation;
pub use shared::SharedStore;
pub use state::VisState;
pub use store::{Listener, PipelineStore};
