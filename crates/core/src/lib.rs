//! Frame pipeline and face-feature detection scheduling.
//!
//! Frames flow from a source (camera or replayed still image) through a
//! publish/subscribe stage graph. The detection stage decides per frame
//! whether to run a full face + sub-feature pass, keeps at most one pass
//! in flight, and annotates outgoing frames with the most recently
//! completed results so the frame path never stalls on detection.

pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod sources;
