// Job exports
pub mod matches;

pub use matches::{
    enqueue_rematch, expire_pending, process_rematch_queue, record_decision, request_rematch,
    run_all, run_bulk_matching, JobContext, JobError,
};
