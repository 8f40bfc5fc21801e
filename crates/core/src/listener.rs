use crate::levels::Levels;

/// Told once per transmitter cycle what the output levels are, so faders can follow fades.
///
/// Not called while the console is in live or edit mode. Runs on the transmitter task and
/// must return quickly.
pub trait FrameListener: Send + Sync {
    fn frame_updated(&self, levels: &Levels);
}

/// Told when a triggered cue has finished and the next trigger may be accepted.
pub trait ExecutionListener: Send + Sync {
    fn execution_finished(&self);
}

impl<F> ExecutionListener for F
where
    F: Fn() + Send + Sync,
{
    fn execution_finished(&self) {
        self()
    }
}
