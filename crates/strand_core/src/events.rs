use nalgebra::DVector;

use crate::status::StatusCode;
use crate::traits::{RealOf, TrackerScalar};

/// Lifecycle notifications emitted by the tracking loop.
///
/// Each variant carries a read-only snapshot of the loop state relevant to
/// that moment. Events are purely observational; nothing a subscriber does
/// can influence control flow.
#[derive(Debug, Clone)]
pub enum TrackingEvent<C: TrackerScalar> {
    Initializing {
        start_time: C,
        end_time: C,
    },
    NewStep {
        current_time: C,
        step_size: RealOf<C>,
    },
    PredictorFailed {
        code: StatusCode,
    },
    SuccessfulPredict {
        predicted: DVector<C>,
    },
    CorrectorFailed {
        code: StatusCode,
    },
    SuccessfulCorrect {
        corrected: DVector<C>,
    },
    SuccessfulStep {
        num_successful_steps: usize,
    },
    FailedStep {
        num_successful_steps: usize,
    },
    InfinitePathTruncation {
        space_norm: RealOf<C>,
    },
    TrackingEnded,
}

/// A subscriber to tracking events.
///
/// Sinks must not block the loop; a sink's own failures are its own concern.
pub trait EventSink<C: TrackerScalar> {
    fn notify(&mut self, event: &TrackingEvent<C>);
}

/// Fan-out of tracking events to zero or more subscribers.
pub struct EventBus<C: TrackerScalar> {
    sinks: Vec<Box<dyn EventSink<C>>>,
}

impl<C: TrackerScalar> Default for EventBus<C> {
    fn default() -> Self {
        Self { sinks: Vec::new() }
    }
}

impl<C: TrackerScalar> EventBus<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink<C>>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn publish(&mut self, event: TrackingEvent<C>) {
        for sink in &mut self.sinks {
            sink.notify(&event);
        }
    }
}

/// Forwards tracking events to the `log` facade: failures at warn level,
/// everything else at debug.
#[derive(Debug, Default)]
pub struct LogSink;

impl<C: TrackerScalar> EventSink<C> for LogSink {
    fn notify(&mut self, event: &TrackingEvent<C>) {
        match event {
            TrackingEvent::PredictorFailed { code } => {
                log::warn!("predictor failed: {:?}", code);
            }
            TrackingEvent::CorrectorFailed { code } => {
                log::warn!("corrector failed: {:?}", code);
            }
            TrackingEvent::InfinitePathTruncation { space_norm } => {
                log::warn!("path truncated as infinite, |x| = {:?}", space_norm);
            }
            other => log::debug!("{:?}", other),
        }
    }
}
