pub mod face;
pub mod highlight;
pub mod history;
pub mod intent;
pub mod orchestrator;
pub mod pagination;

pub use face::{normalize_threshold, FaceMatchController, FaceSettings};
pub use highlight::{excerpt, highlight, match_terms, HighlightSegment};
pub use history::{HistoryStore, MemoryHistoryStore, QueryHistory, MAX_HISTORY, SUGGESTION_COUNT};
pub use intent::{FilterSet, IntentSequencer, SearchIntent, SearchMode, DEFAULT_RESULT_LIMIT};
pub use orchestrator::{SearchOrchestrator, SearchView, SubmitOutcome};
pub use pagination::{paginate, PageMarker, PageWindow, Paginator, PAGE_SIZE};
