//! Event types and sinks for observing a run.
//!
//! This module defines [`StandEvent`] and a set of sinks and adapters to emit,
//! collect, or forward events while the orchestrators execute a timestep via
//! [`crate::mortality::MortalityOrg::do_mortality_with_events`],
//! [`crate::disperse::DisperseOrg::do_disperse_with_events`], or
//! [`crate::runner::StandRunner::run_timestep_with_events`].
use crate::disperse::masting::MastEvent;
use crate::mortality::DeathCause;
use crate::population::{LifeStage, SpeciesId, TreeId};

/// Describes events emitted while running a stand.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum StandEvent {
    /// Emitted when a timestep starts.
    TimestepStarted {
        /// One-based timestep number.
        timestep: u32,
    },

    /// Emitted when a mortality strategy marks a tree dead.
    TreeKilled {
        tree: TreeId,
        species: SpeciesId,
        stage: LifeStage,
        cause: DeathCause,
        /// Name of the strategy that killed the tree.
        strategy: String,
    },

    /// Emitted once per species per timestep by masting dispersal.
    MastDecided {
        species: SpeciesId,
        /// Synchrony group the decision was shared with.
        group: i64,
        event: MastEvent,
    },

    /// Emitted after the seed tallies were adjusted.
    SeedsAdjusted {
        /// Sum of raw seed tallies over all cells and species.
        raw_total: f64,
        /// Sum after the stochastic adjustment.
        adjusted_total: f64,
    },

    /// Emitted when a timestep finishes.
    TimestepFinished {
        timestep: u32,
        deaths: usize,
        seeds: f64,
    },

    /// Non-fatal warning.
    Warning {
        /// Context string (e.g. behavior name).
        context: String,
        /// Human-readable message.
        message: String,
    },
}

/// Discriminant of a [`StandEvent`], used by sinks to declare interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandEventKind {
    TimestepStarted,
    TreeKilled,
    MastDecided,
    SeedsAdjusted,
    TimestepFinished,
    Warning,
}

impl StandEvent {
    pub fn kind(&self) -> StandEventKind {
        match self {
            StandEvent::TimestepStarted { .. } => StandEventKind::TimestepStarted,
            StandEvent::TreeKilled { .. } => StandEventKind::TreeKilled,
            StandEvent::MastDecided { .. } => StandEventKind::MastDecided,
            StandEvent::SeedsAdjusted { .. } => StandEventKind::SeedsAdjusted,
            StandEvent::TimestepFinished { .. } => StandEventKind::TimestepFinished,
            StandEvent::Warning { .. } => StandEventKind::Warning,
        }
    }
}

/// A generic event sink that accepts [`StandEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: StandEvent);

    /// Whether the sink wants events of `kind`. Emitters skip building events nobody wants.
    #[inline]
    fn wants(&self, _kind: StandEventKind) -> bool {
        true
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: StandEvent) {}

    #[inline]
    fn wants(&self, _kind: StandEventKind) -> bool {
        false
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(StandEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(StandEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(StandEvent),
{
    #[inline]
    fn send(&mut self, event: StandEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects events in a `Vec`, optionally filtered by kind.
#[derive(Default)]
pub struct VecSink {
    events: Vec<StandEvent>,
    only: Option<Vec<StandEventKind>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects only the listed kinds.
    pub fn only(kinds: &[StandEventKind]) -> Self {
        Self {
            events: Vec::new(),
            only: Some(kinds.to_vec()),
        }
    }

    pub fn into_inner(self) -> Vec<StandEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[StandEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: StandEvent) {
        if self.wants(event.kind()) {
            self.events.push(event);
        }
    }

    fn wants(&self, kind: StandEventKind) -> bool {
        match &self.only {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }
}

/// Fan-out sink that forwards each event to all contained sinks.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn into_inner(self) -> Vec<S> {
        self.sinks
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: StandEvent) {
        let kind = event.kind();
        for sink in &mut self.sinks {
            if sink.wants(kind) {
                sink.send(event.clone());
            }
        }
    }

    fn wants(&self, kind: StandEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(ctx: &str) -> StandEvent {
        StandEvent::Warning {
            context: ctx.into(),
            message: "m".into(),
        }
    }

    #[test]
    fn unit_sink_wants_nothing() {
        assert!(!().wants(StandEventKind::TreeKilled));
    }

    #[test]
    fn vec_sink_filters_by_kind() {
        let mut sink = VecSink::only(&[StandEventKind::TimestepStarted]);
        sink.send(warning("a"));
        sink.send(StandEvent::TimestepStarted { timestep: 1 });
        assert_eq!(sink.len(), 1);
        assert!(!sink.wants(StandEventKind::Warning));
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn multi_sink_fans_out_events() {
        let mut multi = MultiSink::with_sinks(vec![
            VecSink::new(),
            VecSink::only(&[StandEventKind::TreeKilled]),
        ]);
        multi.send(warning("ctx"));
        assert!(multi.wants(StandEventKind::Warning));
        let sinks = multi.into_inner();
        assert_eq!(sinks[0].len(), 1);
        assert_eq!(sinks[1].len(), 0);
    }

    #[test]
    fn fn_sink_invokes_callback() {
        let mut count = 0;
        let mut sink = FnSink::new(|_event| {
            count += 1;
        });
        sink.send(warning("ctx"));
        drop(sink);
        assert_eq!(count, 1);
    }
}
