mod delivery;
mod error;
mod models;
mod rate_limiter;
mod selector;
mod store;

pub use delivery::{
    ComposeArtist, ComposeOutcome, ComposeRequest, Delivery, DeliveryService,
    ANONYMOUS_SENDER_NAME,
};
pub use error::LetterError;
pub use models::{Letter, LetterStatus, NewLetter, Reply};
pub use rate_limiter::{calendar_day_bounds, can_send, SendAllowance};
pub use selector::{
    CandidateLoad, LeastLoadedPolicy, RecipientSelectionPolicy, SelectionPolicyKind,
    UniformRandomPolicy,
};
pub use store::{ComposeInsert, LetterStore};
