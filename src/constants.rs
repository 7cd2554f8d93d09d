/// Default EAR below which an eye counts as closed for a frame
pub const DEFAULT_EAR_THRESHOLD: f64 = 0.25;

/// Default number of consecutive closed-eye frames before alerting
pub const DEFAULT_CONSEC_FRAMES: u32 = 20;

/// Face-mesh indices for the left eye: outer corner, upper pair, inner corner, lower pair
pub const LEFT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Face-mesh indices for the right eye, same ordering as [`LEFT_EYE`]
pub const RIGHT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Buffered frames per live session before pushers wait
pub const DEFAULT_FRAME_QUEUE_DEPTH: usize = 32;

/// Capacity of the per-session event broadcast
pub const SESSION_EVENT_CAPACITY: usize = 256;

/// Default live session cap
pub const DEFAULT_MAX_SESSIONS: usize = 16;

/// Default concurrent SSE stream cap
pub const DEFAULT_MAX_SSE_CONNECTIONS: usize = 64;

/// Default idle time before a live session without frames is stopped
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 300;

/// Upper bound on the idle sweep period
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 30;

/// Default frame cap for a single replay request
pub const DEFAULT_MAX_REPLAY_FRAMES: usize = 100_000;
