mod engine;

pub use engine::{
    format_elapsed, ActiveTimer, TimerEngine, TimerSettings, TimerState, Transition,
    IDLE_GAP_CAP_SECS, MAX_SESSION_SECS,
};
