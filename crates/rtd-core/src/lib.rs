pub mod chain;
pub mod event;
pub mod fleet;
pub mod validate;

pub use chain::{ChainResource, ChainRun, Phase, Step};
pub use event::{
    Event, EventKind, EventPayload, ResultPayload, Subject, SubjectError, TaskPayload, WireEvent,
};
pub use fleet::{KnightState, KnightStatus};
pub use validate::{ValidationError, MAX_TASK_LEN};
