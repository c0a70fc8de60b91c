use thiserror::Error;

use crate::dao::models::{CourtEntity, MatchEntity, MatchId};

/// Lifecycle of a court, derived from its current-match pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtPhase {
    /// No match is bound to the court.
    Idle,
    /// A match is bound and still being played.
    Active {
        /// Match currently being scored.
        match_id: MatchId,
    },
    /// The bound match is finished and the court waits for the next one.
    Completed {
        /// Match that just finished.
        match_id: MatchId,
    },
}

/// Events that move a court between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtEvent {
    /// Bind the next scheduled match to the court.
    Advance {
        /// Match selected to be played next.
        next_match_id: MatchId,
    },
    /// The bound match reached its set threshold.
    CompleteMatch,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the court was in.
    pub from: CourtPhase,
    /// The rejected event.
    pub event: CourtEvent,
}

impl CourtPhase {
    /// Derive the phase from the court row and the match it points at.
    ///
    /// A pointer to a match that no longer exists is treated as idle.
    pub fn resolve(court: &CourtEntity, current: Option<&MatchEntity>) -> Self {
        match (court.current_match_id, current) {
            (Some(id), Some(found)) if found.id == id && found.is_completed => {
                CourtPhase::Completed { match_id: id }
            }
            (Some(id), Some(found)) if found.id == id => CourtPhase::Active { match_id: id },
            _ => CourtPhase::Idle,
        }
    }

    /// Match bound to the court, if any.
    pub fn current_match_id(&self) -> Option<MatchId> {
        match self {
            CourtPhase::Idle => None,
            CourtPhase::Active { match_id } | CourtPhase::Completed { match_id } => Some(*match_id),
        }
    }

    /// Compute the phase reached by applying `event`.
    pub fn next(self, event: CourtEvent) -> Result<CourtPhase, InvalidTransition> {
        let next = match (self, event) {
            (CourtPhase::Idle | CourtPhase::Completed { .. }, CourtEvent::Advance { next_match_id }) => {
                CourtPhase::Active {
                    match_id: next_match_id,
                }
            }
            (CourtPhase::Active { match_id }, CourtEvent::CompleteMatch) => {
                CourtPhase::Completed { match_id }
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn court(current: Option<MatchId>) -> CourtEntity {
        CourtEntity {
            id: 5,
            name: "Court 5".into(),
            current_match_id: current,
            recorder_device_id: None,
        }
    }

    fn match_entity(id: MatchId, completed: bool) -> MatchEntity {
        MatchEntity {
            id,
            court_id: 5,
            team_a: "A".into(),
            team_b: "B".into(),
            sets_a: 0,
            sets_b: 0,
            scheduled_start: None,
            is_completed: completed,
            external_match_id: None,
            is_crossover: false,
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn resolves_phase_from_pointer() {
        assert_eq!(CourtPhase::resolve(&court(None), None), CourtPhase::Idle);
        assert_eq!(
            CourtPhase::resolve(&court(Some(3)), Some(&match_entity(3, false))),
            CourtPhase::Active { match_id: 3 }
        );
        assert_eq!(
            CourtPhase::resolve(&court(Some(3)), Some(&match_entity(3, true))),
            CourtPhase::Completed { match_id: 3 }
        );
        assert_eq!(CourtPhase::resolve(&court(Some(3)), None), CourtPhase::Idle);
    }

    #[test]
    fn advance_allowed_from_idle_and_completed() {
        let event = CourtEvent::Advance { next_match_id: 9 };
        assert_eq!(
            CourtPhase::Idle.next(event),
            Ok(CourtPhase::Active { match_id: 9 })
        );
        assert_eq!(
            CourtPhase::Completed { match_id: 4 }.next(event),
            Ok(CourtPhase::Active { match_id: 9 })
        );
    }

    #[test]
    fn advance_rejected_while_active() {
        let err = CourtPhase::Active { match_id: 4 }
            .next(CourtEvent::Advance { next_match_id: 9 })
            .unwrap_err();
        assert_eq!(err.from, CourtPhase::Active { match_id: 4 });
    }

    #[test]
    fn completion_only_from_active() {
        assert_eq!(
            CourtPhase::Active { match_id: 2 }.next(CourtEvent::CompleteMatch),
            Ok(CourtPhase::Completed { match_id: 2 })
        );
        assert!(CourtPhase::Idle.next(CourtEvent::CompleteMatch).is_err());
    }
}
