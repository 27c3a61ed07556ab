//! Plug-connection gestures: turning presses and releases on ports into
//! completed connection pairs.
//!
//! The handler is a pure state machine. It never touches the document —
//! the owner wires a `ConnectionComplete` output to
//! `Document::create_connection`, where the edit is validated for real.

use std::fmt;

use crate::document::{ConnectionId, ModuleId, ModulePort};

/// Dense connection-endpoint handle: module ID in the high 32 bits, port
/// index in the low 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlugId(u64);

impl PlugId {
    pub fn new(module: ModuleId, port: u32) -> Self {
        Self((u64::from(module.0) << 32) | u64::from(port))
    }

    pub fn module_id(self) -> ModuleId {
        ModuleId((self.0 >> 32) as u32)
    }

    pub fn port_index(self) -> u32 {
        self.0 as u32
    }

    pub fn to_port(self) -> ModulePort {
        ModulePort::new(self.module_id(), self.port_index())
    }
}

impl From<ModulePort> for PlugId {
    fn from(port: ModulePort) -> Self {
        Self::new(port.module, port.port)
    }
}

impl fmt::Display for PlugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module_id(), self.port_index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugMode {
    Inlet,
    Outlet,
}

/// Pointer input, already resolved to the port it landed on. `hold` is the
/// keep-connecting modifier (shift in the original interaction scheme).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugGesture {
    Press {
        mode: PlugMode,
        plug: PlugId,
        hold: bool,
    },
    Drag,
    Release {
        mode: PlugMode,
        plug: PlugId,
        hold: bool,
    },
    Abort,
}

/// Notification outputs. These never mutate anything themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugOutput {
    /// A gesture opened; carries the grabbed port for drag-cable rendering.
    ConnectionStart { mode: PlugMode, origin: PlugId },
    DragUpdate,
    /// A validated-shape pair, source always the outlet end.
    ConnectionComplete(ConnectionId),
    ConnectionAbort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlugState {
    Idle,
    Connecting { origin_mode: PlugMode, origin: PlugId },
}

#[derive(Debug)]
pub struct PlugHandler {
    state: PlugState,
}

impl Default for PlugHandler {
    fn default() -> Self {
        Self {
            state: PlugState::Idle,
        }
    }
}

impl PlugHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self.state, PlugState::Connecting { .. })
    }

    pub fn handle(&mut self, gesture: PlugGesture) -> Option<PlugOutput> {
        match (self.state, gesture) {
            (PlugState::Idle, PlugGesture::Press { mode, plug, .. }) => {
                self.state = PlugState::Connecting {
                    origin_mode: mode,
                    origin: plug,
                };
                Some(PlugOutput::ConnectionStart { mode, origin: plug })
            }

            // A press while a gesture is open completes or discards it
            // first, exactly like a release; the next press starts fresh
            // from Idle.
            (
                PlugState::Connecting { origin_mode, origin },
                PlugGesture::Press { mode, plug, hold }
                | PlugGesture::Release { mode, plug, hold },
            ) => self.end_connection(origin_mode, origin, mode, plug, hold),

            (PlugState::Connecting { .. }, PlugGesture::Drag) => Some(PlugOutput::DragUpdate),

            (PlugState::Connecting { .. }, PlugGesture::Abort) => {
                self.state = PlugState::Idle;
                Some(PlugOutput::ConnectionAbort)
            }

            (PlugState::Idle, _) => None,
        }
    }

    fn end_connection(
        &mut self,
        origin_mode: PlugMode,
        origin: PlugId,
        mode: PlugMode,
        plug: PlugId,
        hold: bool,
    ) -> Option<PlugOutput> {
        // The hold modifier keeps the cable alive on the same origin so the
        // next connection starts without another press.
        if !hold {
            self.state = PlugState::Idle;
        }

        let compatible = mode != origin_mode && plug.module_id() != origin.module_id();
        if compatible {
            let (source, destination) = match origin_mode {
                PlugMode::Outlet => (origin, plug),
                PlugMode::Inlet => (plug, origin),
            };
            Some(PlugOutput::ConnectionComplete(ConnectionId::new(
                source.to_port(),
                destination.to_port(),
            )))
        } else if hold {
            None
        } else {
            Some(PlugOutput::ConnectionAbort)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plug_id_packs_both_fields() {
        let plug = PlugId::new(ModuleId(7), 3);
        assert_eq!(plug.module_id(), ModuleId(7));
        assert_eq!(plug.port_index(), 3);
        assert_eq!(plug, PlugId::from(ModulePort::new(ModuleId(7), 3)));
        assert_ne!(plug, PlugId::new(ModuleId(3), 7));
    }

    #[test]
    fn display_matches_module_colon_port() {
        assert_eq!(PlugId::new(ModuleId(12), 1).to_string(), "12:1");
    }
}
