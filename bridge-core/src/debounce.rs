//! Entprellung digitaler Eingänge
//!
//! Pure Logik ohne Seiteneffekte: aus rohen, prellenden Pegeln wird ein
//! sauberer Strom von Flanken.

use crate::types::Millis;

/// Richtung einer Flanke (bezogen auf den rohen Pegel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    RisingToHigh,
    FallingToLow,
}

/// Entprellte, akzeptierte Flanke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edge {
    pub direction: Direction,
    pub at: Millis,
}

impl Edge {
    /// Pegel nach der Flanke
    pub fn level(&self) -> bool {
        self.direction == Direction::RisingToHigh
    }
}

/// Zeitbasierter Flankendetektor
///
/// Eine neue Probe wird nur als Flanke akzeptiert, wenn sie vom zuletzt
/// akzeptierten Pegel abweicht UND seit der letzten akzeptierten Flanke
/// mindestens `debounce_ms` vergangen sind. Die allererste Änderung wird
/// sofort akzeptiert.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    debounce_ms: Millis,
    last_accepted_value: bool,
    last_accepted_at: Option<Millis>,
}

impl EdgeDetector {
    pub const fn new(debounce_ms: Millis, initial_value: bool) -> Self {
        Self {
            debounce_ms,
            last_accepted_value: initial_value,
            last_accepted_at: None,
        }
    }

    /// Verarbeitet eine rohe Probe; einmal pro Tick und Eingang aufrufen
    pub fn observe(&mut self, raw_value: bool, now: Millis) -> Option<Edge> {
        if raw_value == self.last_accepted_value {
            return None;
        }

        if let Some(last) = self.last_accepted_at {
            if now.saturating_sub(last) < self.debounce_ms {
                return None;
            }
        }

        self.last_accepted_value = raw_value;
        self.last_accepted_at = Some(now);

        let direction = if raw_value {
            Direction::RisingToHigh
        } else {
            Direction::FallingToLow
        };
        Some(Edge {
            direction,
            at: now,
        })
    }

    /// Zuletzt akzeptierter Pegel
    pub fn level(&self) -> bool {
        self.last_accepted_value
    }

    pub fn last_accepted_at(&self) -> Option<Millis> {
        self.last_accepted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_change_is_accepted_immediately() {
        let mut detector = EdgeDetector::new(200, true);
        let edge = detector.observe(false, 0);
        assert_eq!(
            edge,
            Some(Edge {
                direction: Direction::FallingToLow,
                at: 0
            })
        );
        assert!(!detector.level());
    }

    #[test]
    fn test_same_level_yields_nothing() {
        let mut detector = EdgeDetector::new(200, true);
        assert_eq!(detector.observe(true, 0), None);
        assert_eq!(detector.observe(true, 500), None);
        assert_eq!(detector.last_accepted_at(), None);
    }

    #[test]
    fn test_bounce_inside_window_is_ignored() {
        let mut detector = EdgeDetector::new(200, true);
        assert!(detector.observe(false, 1_000).is_some());
        assert_eq!(detector.observe(true, 1_005), None);
        assert_eq!(detector.observe(false, 1_010), None);
        assert_eq!(detector.observe(true, 1_150), None);
        assert!(!detector.level());
    }

    #[test]
    fn test_change_after_window_is_accepted() {
        let mut detector = EdgeDetector::new(200, true);
        detector.observe(false, 1_000);
        let edge = detector.observe(true, 1_200).unwrap();
        assert_eq!(edge.direction, Direction::RisingToHigh);
        assert_eq!(edge.at, 1_200);
        assert!(edge.level());
    }

    #[test]
    fn test_late_release_is_reported_on_next_poll() {
        // Kurzer Druck (< Fenster): das Loslassen wird erst nach Ablauf
        // des Fensters gemeldet, geht aber nicht verloren
        let mut detector = EdgeDetector::new(200, true);
        detector.observe(false, 0);
        assert_eq!(detector.observe(true, 100), None);
        assert_eq!(detector.observe(true, 150), None);
        let edge = detector.observe(true, 200).unwrap();
        assert_eq!(edge.direction, Direction::RisingToHigh);
    }
}
