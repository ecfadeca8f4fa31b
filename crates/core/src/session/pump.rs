use std::io::Write;
use std::sync::Arc;

use crate::encoder::FrameEncoder;
use crate::protocol::multipart;
use crate::session::{PumpState, Session};
use crate::signal::StopSignal;
use crate::source::{SourceDescriptor, SourceHandle};
use crate::supervisor::ReconnectSupervisor;

/// Counters for one pump run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Parts successfully written to the sink.
    pub frames_written: u64,
    /// Frames the encoder rejected.
    pub frames_dropped: u64,
    /// Completed Recovering -> Streaming cycles.
    pub recoveries: u64,
}

/// Outcome of [`StreamPump::run`].
#[derive(Debug, Clone)]
pub struct PumpReport {
    pub stats: PumpStats,
    pub reason: &'static str,
}

/// The per-client loop: read, encode, write, repeat.
///
/// Strictly sequential: one read outstanding, one frame in flight, parts
/// written in the order frames were read. Only a failed write or the stop
/// signal ends it; read failures go through the supervisor and encode
/// failures drop the frame. Running consumes the pump, so `Stopped` has no
/// way out.
pub struct StreamPump {
    session: Arc<Session>,
    descriptor: SourceDescriptor,
    supervisor: ReconnectSupervisor,
    encoder: FrameEncoder,
    stop: StopSignal,
    stats: PumpStats,
}

impl StreamPump {
    pub fn new(
        session: Arc<Session>,
        descriptor: SourceDescriptor,
        supervisor: ReconnectSupervisor,
        encoder: FrameEncoder,
        stop: StopSignal,
    ) -> Self {
        Self {
            session,
            descriptor,
            supervisor,
            encoder,
            stop,
            stats: PumpStats::default(),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Stream into `sink` until it fails or the stop signal fires.
    pub fn run<W: Write + ?Sized>(mut self, sink: &mut W) -> PumpReport {
        self.enter(PumpState::Starting);
        let mut handle = match self.supervisor.acquire(&self.descriptor) {
            Ok(handle) => handle,
            Err(_) => return self.finish(None, "stopped before source opened"),
        };
        self.enter(PumpState::Streaming);

        let reason = loop {
            if self.stop.is_triggered() {
                break "server shutting down";
            }

            let image = match handle.read_frame() {
                Ok(image) => image,
                Err(err) => {
                    self.enter(PumpState::Recovering);
                    match self.supervisor.recover(&self.descriptor, handle, &err) {
                        Ok(fresh) => {
                            handle = fresh;
                            self.stats.recoveries += 1;
                            self.enter(PumpState::Streaming);
                            continue;
                        }
                        Err(_) => return self.finish(None, "server shutting down"),
                    }
                }
            };

            let frame = match self.encoder.encode(&image) {
                Ok(frame) => frame,
                Err(err) => {
                    self.stats.frames_dropped += 1;
                    tracing::debug!(session_id = %self.session.id, error = %err, "frame dropped");
                    continue;
                }
            };
            drop(image);

            if let Err(err) = multipart::write_part(sink, &frame) {
                tracing::debug!(session_id = %self.session.id, error = %err, "sink write failed");
                break "client disconnected";
            }
            self.stats.frames_written += 1;
            tracing::trace!(
                session_id = %self.session.id,
                bytes = frame.len(),
                frames = self.stats.frames_written,
                "frame written"
            );
        };

        self.finish(Some(handle), reason)
    }

    fn enter(&self, state: PumpState) {
        self.session.set_state(state);
    }

    fn finish(self, handle: Option<SourceHandle>, reason: &'static str) -> PumpReport {
        if let Some(mut handle) = handle {
            handle.release();
        }
        self.enter(PumpState::Stopped);
        tracing::info!(
            session_id = %self.session.id,
            source = %self.session.source,
            reason,
            frames = self.stats.frames_written,
            dropped = self.stats.frames_dropped,
            recoveries = self.stats.recoveries,
            "stream ended"
        );
        PumpReport {
            stats: self.stats,
            reason,
        }
    }
}
