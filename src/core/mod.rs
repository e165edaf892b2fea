pub mod content;
pub mod dispatcher;
pub mod splitter;

pub use crate::domain::model::{
    InterviewRoundRecord, OutboundEmail, ProcessingSummary, RawCandidateRow, Record,
    RecordOutcome, SendResult,
};
pub use crate::domain::ports::{DataStore, EmailTransport, Sleeper};
pub use crate::utils::error::Result;
