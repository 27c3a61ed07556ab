//! Plug-connection gesture protocol: the press/release state machine that
//! turns pointer input on ports into connection pairs.

use patchbay::document::{ConnectionId, ModuleId, ModulePort};
use patchbay::plug::{PlugGesture, PlugHandler, PlugId, PlugMode, PlugOutput};

fn press(mode: PlugMode, module: u32, port: u32) -> PlugGesture {
    PlugGesture::Press {
        mode,
        plug: PlugId::new(ModuleId(module), port),
        hold: false,
    }
}

fn release(mode: PlugMode, module: u32, port: u32, hold: bool) -> PlugGesture {
    PlugGesture::Release {
        mode,
        plug: PlugId::new(ModuleId(module), port),
        hold,
    }
}

fn pair(source: (u32, u32), dest: (u32, u32)) -> ConnectionId {
    ConnectionId::new(
        ModulePort::new(ModuleId(source.0), source.1),
        ModulePort::new(ModuleId(dest.0), dest.1),
    )
}

#[test]
fn same_mode_release_aborts_without_a_pair() {
    let mut handler = PlugHandler::new();

    let started = handler.handle(press(PlugMode::Outlet, 1, 0));
    assert!(matches!(
        started,
        Some(PlugOutput::ConnectionStart {
            mode: PlugMode::Outlet,
            ..
        })
    ));
    assert!(handler.is_connecting());

    let ended = handler.handle(release(PlugMode::Outlet, 2, 0, false));
    assert_eq!(ended, Some(PlugOutput::ConnectionAbort));
    assert!(!handler.is_connecting());
}

#[test]
fn outlet_to_inlet_release_completes_the_pair() {
    let mut handler = PlugHandler::new();
    handler.handle(press(PlugMode::Outlet, 1, 0));

    let ended = handler.handle(release(PlugMode::Inlet, 2, 0, false));
    assert_eq!(
        ended,
        Some(PlugOutput::ConnectionComplete(pair((1, 0), (2, 0))))
    );
    assert!(!handler.is_connecting());
}

#[test]
fn inlet_origin_still_yields_outlet_as_source() {
    let mut handler = PlugHandler::new();
    handler.handle(press(PlugMode::Inlet, 2, 1));

    let ended = handler.handle(release(PlugMode::Outlet, 1, 0, false));
    assert_eq!(
        ended,
        Some(PlugOutput::ConnectionComplete(pair((1, 0), (2, 1))))
    );
}

#[test]
fn same_module_release_is_rejected() {
    let mut handler = PlugHandler::new();
    handler.handle(press(PlugMode::Outlet, 1, 0));

    let ended = handler.handle(release(PlugMode::Inlet, 1, 1, false));
    assert_eq!(ended, Some(PlugOutput::ConnectionAbort));
    assert!(!handler.is_connecting());
}

#[test]
fn hold_modifier_keeps_the_gesture_alive() {
    let mut handler = PlugHandler::new();
    handler.handle(press(PlugMode::Outlet, 1, 0));

    // First completion with hold: pair emitted, cable stays up.
    let first = handler.handle(release(PlugMode::Inlet, 2, 0, true));
    assert_eq!(
        first,
        Some(PlugOutput::ConnectionComplete(pair((1, 0), (2, 0))))
    );
    assert!(handler.is_connecting());

    // Second completion from the same origin, no re-press needed.
    let second = handler.handle(release(PlugMode::Inlet, 3, 0, false));
    assert_eq!(
        second,
        Some(PlugOutput::ConnectionComplete(pair((1, 0), (3, 0))))
    );
    assert!(!handler.is_connecting());
}

#[test]
fn press_while_connecting_completes_the_open_gesture_first() {
    let mut handler = PlugHandler::new();
    handler.handle(press(PlugMode::Outlet, 1, 0));

    // The press acts like a release against the open gesture.
    let completed = handler.handle(press(PlugMode::Inlet, 2, 0));
    assert_eq!(
        completed,
        Some(PlugOutput::ConnectionComplete(pair((1, 0), (2, 0))))
    );
    assert!(!handler.is_connecting());
}

#[test]
fn drag_updates_only_while_connecting() {
    let mut handler = PlugHandler::new();
    assert_eq!(handler.handle(PlugGesture::Drag), None);

    handler.handle(press(PlugMode::Outlet, 1, 0));
    assert_eq!(handler.handle(PlugGesture::Drag), Some(PlugOutput::DragUpdate));
}

#[test]
fn abort_always_returns_to_idle() {
    let mut handler = PlugHandler::new();
    handler.handle(press(PlugMode::Inlet, 4, 2));
    assert!(handler.is_connecting());

    assert_eq!(
        handler.handle(PlugGesture::Abort),
        Some(PlugOutput::ConnectionAbort)
    );
    assert!(!handler.is_connecting());
    assert_eq!(handler.handle(PlugGesture::Abort), None);
}

#[test]
fn release_in_idle_emits_nothing() {
    let mut handler = PlugHandler::new();
    assert_eq!(handler.handle(release(PlugMode::Inlet, 1, 0, false)), None);
    assert!(!handler.is_connecting());
}
