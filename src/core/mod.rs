pub mod criteria;
pub mod engine;
pub mod error;
pub mod skip;

pub use criteria::{MatchMode, SearchCriteria, UNBOUNDED_SIZE};
pub use engine::{
    RunState, SearchEngine, SearchEvent, SearchHandle, SearchRun, SearchSummary,
    DEFAULT_EVENT_BUFFER,
};
pub use error::CoreError;
