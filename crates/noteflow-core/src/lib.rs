pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{GraphConfigError, ModelError, ModelErrorKind, NoteflowError, Result};
pub use event::{EventBus, WorkflowEvent};
pub use state::{NodeResult, StageOutput, StateDelta, StateField, WorkflowState};
pub use traits::LanguageModel;
pub use types::*;
