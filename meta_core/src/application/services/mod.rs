pub mod callback_router;
pub mod event_consumer;
pub mod gate;
pub mod persistence;
pub mod pipeline;
pub mod scheduler;
pub mod state_registry;
pub mod work_queue;

pub use callback_router::{CallbackOutcomeKind, CallbackPayload, CallbackRouter};
pub use event_consumer::EventConsumer;
pub use gate::{DrainCount, DrainObservable, GateController};
pub use persistence::PersistenceAdapter;
pub use pipeline::{Pipeline, PipelineConcurrency};
pub use scheduler::{CallbackOutcome, CallbackStatus, RunningTaskView, TaskScheduler};
pub use state_registry::{StateCounts, StateRegistry};
pub use work_queue::{WorkHandle, WorkQueue};
