use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

/// Pointer input over the canvas, in client (window) coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Enter { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Leave,
    Click { x: f32, y: f32 },
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseEventError {
    #[error("unknown pointer event `{0}` (expected enter, move, leave or click)")]
    UnknownKind(String),
    #[error("expected coordinates as X,Y in `{0}`")]
    BadCoordinates(String),
    #[error("`leave` takes no coordinates")]
    UnexpectedCoordinates,
}

/// Script syntax: `enter:X,Y`, `move:X,Y`, `leave`, `click:X,Y`
impl FromStr for PointerEvent {
    type Err = ParseEventError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, coords) = match s.split_once(':') {
            Some((kind, coords)) => (kind.trim(), Some(coords)),
            None => (s, None),
        };

        let point = || -> std::result::Result<(f32, f32), ParseEventError> {
            let raw = coords.ok_or_else(|| ParseEventError::BadCoordinates(s.to_string()))?;
            parse_point(raw).ok_or_else(|| ParseEventError::BadCoordinates(s.to_string()))
        };

        match kind.to_ascii_lowercase().as_str() {
            "enter" => point().map(|(x, y)| Self::Enter { x, y }),
            "move" => point().map(|(x, y)| Self::Move { x, y }),
            "click" => point().map(|(x, y)| Self::Click { x, y }),
            "leave" if coords.is_none() => Ok(Self::Leave),
            "leave" => Err(ParseEventError::UnexpectedCoordinates),
            other => Err(ParseEventError::UnknownKind(other.to_string())),
        }
    }
}

/// Parse `X,Y` into a pair of finite floats
pub fn parse_point(raw: &str) -> Option<(f32, f32)> {
    let (x, y) = raw.split_once(',')?;
    let x: f32 = x.trim().parse().ok()?;
    let y: f32 = y.trim().parse().ok()?;
    (x.is_finite() && y.is_finite()).then_some((x, y))
}

/// Trait for abstracting event sources to enable testing
pub trait EventSource {
    /// Poll for events with a timeout
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Read the next event
    fn read(&mut self) -> Result<PointerEvent>;
}

/// Replays a fixed list of pointer events
pub struct ScriptedEventSource {
    pub(crate) events: Vec<PointerEvent>,
    current_index: usize,
}

impl ScriptedEventSource {
    pub fn new(events: Vec<PointerEvent>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }

    /// Parse one event per script entry
    pub fn parse<'a>(script: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let events = script
            .into_iter()
            .map(str::parse)
            .collect::<std::result::Result<Vec<PointerEvent>, _>>()?;
        Ok(Self::new(events))
    }

    /// Number of events not yet read
    pub fn remaining(&self) -> usize {
        self.events.len() - self.current_index
    }
}

impl EventSource for ScriptedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<PointerEvent> {
        let event = self
            .events
            .get(self.current_index)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("event script exhausted"))?;
        self.current_index += 1;
        Ok(event)
    }
}
