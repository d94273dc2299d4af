use cu29_clock::CuTime;
use log::debug;

/// Anything that can sit in the preloaded message buffer.
pub trait Timestamped {
    fn receive_time(&self) -> CuTime;
}

impl Timestamped for CuTime {
    fn receive_time(&self) -> CuTime {
        *self
    }
}

/// Replays a time sorted, append only buffer of preloaded messages up to the
/// current time, dispatching each message exactly once.
///
/// The buffer must stay sorted by receive time and topics may only be added to
/// or removed from it as a whole. Anything else is not detected and leads to
/// skipped or repeated messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllFramesCursor {
    /// Index of the last dispatched message.
    index: Option<usize>,
    cursor_time_reached: Option<CuTime>,
}

impl AllFramesCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn cursor_time_reached(&self) -> Option<CuTime> {
        self.cursor_time_reached
    }

    /// Must be called after a backward seek so the buffer is replayed from the start.
    pub fn reset(&mut self) {
        if self.index.is_some() {
            debug!("Resetting all frames cursor");
        }
        *self = Self::default();
    }

    /// Dispatch every message after the cursor with a receive time at or
    /// before `current_time`. Returns whether anything was dispatched.
    pub fn advance<M, F>(&mut self, buffer: &[M], current_time: CuTime, mut dispatch: F) -> bool
    where
        M: Timestamped,
        F: FnMut(&M),
    {
        if buffer.is_empty() {
            self.reset();
            return false;
        }

        // the buffer may have shrunk from the front since the last call
        let mut index = self.index.map(|i| i.min(buffer.len() - 1));
        let mut cursor_time_reached = self.cursor_time_reached;
        let mut dispatched = false;

        loop {
            let next = index.map_or(0, |i| i + 1);
            let Some(message) = buffer.get(next) else {
                break;
            };
            if message.receive_time() > current_time {
                cursor_time_reached = Some(current_time);
                break;
            }
            dispatch(message);
            dispatched = true;
            index = Some(next);
            if next == buffer.len() - 1 {
                cursor_time_reached = Some(message.receive_time());
            }
        }

        if !dispatched {
            return false;
        }
        self.index = index;
        self.cursor_time_reached = cursor_time_reached;
        true
    }
}
