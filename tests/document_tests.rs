//! Document model invariants: identity, cascade deletes, edit rejection,
//! and listener notification.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use patchbay::document::{
    Bounds, ConnectionId, Document, DocumentEvent, DocumentListener, ModuleId, ModulePort,
};

struct Recorder {
    events: Rc<RefCell<Vec<DocumentEvent>>>,
}

impl DocumentListener for Recorder {
    fn document_changed(&mut self, _document: &Document, event: &DocumentEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

fn with_recorder(document: &mut Document) -> Rc<RefCell<Vec<DocumentEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    document.add_listener(Box::new(Recorder {
        events: Rc::clone(&events),
    }));
    events
}

fn connect(document: &mut Document, source: (ModuleId, u32), dest: (ModuleId, u32)) -> ConnectionId {
    let connection = ConnectionId::new(
        ModulePort::new(source.0, source.1),
        ModulePort::new(dest.0, dest.1),
    );
    document.create_connection(connection).unwrap();
    connection
}

#[test]
fn first_two_modules_get_ids_one_and_two() {
    let mut document = Document::new();
    let events = with_recorder(&mut document);

    let impulse = document.add_module("Impulse", 10, 20).unwrap();
    assert_eq!(impulse, ModuleId(1));
    let output = document.add_module("Output", 100, 20).unwrap();
    assert_eq!(output, ModuleId(2));

    let connection = connect(&mut document, (impulse, 0), (output, 0));
    assert!(events
        .borrow()
        .contains(&DocumentEvent::ConnectionCreated(connection)));

    document.delete_module(impulse);
    assert!(events
        .borrow()
        .contains(&DocumentEvent::ModuleDeleted(impulse)));
    assert!(!document
        .connections()
        .iter()
        .any(|connection| connection.touches(impulse)));
}

#[test]
fn module_delete_fires_before_its_connection_cascade() {
    let mut document = Document::new();
    let impulse = document.add_module("Impulse", 0, 0).unwrap();
    let output = document.add_module("Output", 0, 0).unwrap();
    let connection = connect(&mut document, (impulse, 0), (output, 0));

    let events = with_recorder(&mut document);
    document.delete_module(impulse);

    assert_eq!(
        events.borrow().as_slice(),
        &[
            DocumentEvent::ModuleDeleted(impulse),
            DocumentEvent::ConnectionDeleted(connection),
        ]
    );
}

#[test]
fn cascade_removes_only_touching_connections() {
    let mut document = Document::new();
    let a = document.add_module("Impulse", 0, 0).unwrap();
    let b = document.add_module("Gain", 0, 0).unwrap();
    let c = document.add_module("Output", 0, 0).unwrap();

    connect(&mut document, (a, 0), (b, 0));
    let kept = connect(&mut document, (b, 0), (c, 0));

    document.delete_module(a);
    assert_eq!(document.connections(), &[kept]);
}

#[test]
fn unknown_module_type_is_rejected() {
    let mut document = Document::new();
    assert!(document.add_module("Warbler", 0, 0).is_err());
    assert_eq!(document.num_modules(), 0);
}

#[test]
fn create_connection_rejects_without_events_or_state_change() {
    let mut document = Document::new();
    let impulse = document.add_module("Impulse", 0, 0).unwrap();
    let gain = document.add_module("Gain", 0, 0).unwrap();
    let events = with_recorder(&mut document);

    // Self loop.
    let self_loop = ConnectionId::new(
        ModulePort::new(impulse, 0),
        ModulePort::new(impulse, 0),
    );
    assert!(document.create_connection(self_loop).is_err());

    // Port out of range on either end.
    let bad_outlet = ConnectionId::new(
        ModulePort::new(gain, 5),
        ModulePort::new(impulse, 0),
    );
    assert!(document.create_connection(bad_outlet).is_err());
    let bad_inlet = ConnectionId::new(
        ModulePort::new(impulse, 0),
        ModulePort::new(gain, 9),
    );
    assert!(document.create_connection(bad_inlet).is_err());

    // Second source into an already-connected inlet.
    document
        .create_connection(ConnectionId::new(
            ModulePort::new(impulse, 0),
            ModulePort::new(gain, 0),
        ))
        .unwrap();
    let duplicate = ConnectionId::new(
        ModulePort::new(impulse, 1),
        ModulePort::new(gain, 0),
    );
    assert!(document.create_connection(duplicate).is_err());

    assert_eq!(document.connections().len(), 1);
    let events = events.borrow();
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, DocumentEvent::ConnectionCreated(_)))
            .count(),
        1
    );
}

#[test]
fn delete_module_is_idempotent() {
    let mut document = Document::new();
    let id = document.add_module("Gain", 0, 0).unwrap();
    document.delete_module(id);

    let events = with_recorder(&mut document);
    document.delete_module(id);
    assert!(events.borrow().is_empty());
}

#[test]
fn setters_on_missing_ids_are_silent_noops() {
    let mut document = Document::new();
    let events = with_recorder(&mut document);

    let ghost = ModuleId(42);
    document.set_module_bounds(ghost, Bounds::new(1, 2, 3, 4));
    document.set_module_enabled(ghost, false);
    document.set_module_colour(ghost, 0xff0000ff);
    document.delete_connection(ConnectionId::new(
        ModulePort::new(ghost, 0),
        ModulePort::new(ModuleId(43), 0),
    ));

    assert!(events.borrow().is_empty());
    assert!(!document.is_dirty());
}

#[test]
fn listeners_observe_post_state() {
    struct PostStateCheck;

    impl DocumentListener for PostStateCheck {
        fn document_changed(&mut self, document: &Document, event: &DocumentEvent) {
            match event {
                DocumentEvent::ModuleAdded(id) => {
                    assert!(document.module(*id).is_some());
                }
                DocumentEvent::ModuleDeleted(id) => {
                    assert!(document.module(*id).is_none());
                    assert!(!document
                        .connections()
                        .iter()
                        .any(|connection| connection.touches(*id)));
                }
                _ => {}
            }
        }
    }

    let mut document = Document::new();
    document.add_listener(Box::new(PostStateCheck));

    let impulse = document.add_module("Impulse", 0, 0).unwrap();
    let output = document.add_module("Output", 0, 0).unwrap();
    connect(&mut document, (impulse, 0), (output, 0));
    document.delete_module(impulse);
}

#[test]
fn fuzzed_edits_never_leave_dangling_connections() {
    let mut rng = StdRng::seed_from_u64(0x9ad5);
    let mut document = Document::new();
    let mut alive: Vec<ModuleId> = Vec::new();
    let types = ["Impulse", "Gain", "Filter", "Output", "LFO"];

    for _ in 0..500 {
        match rng.gen_range(0..4) {
            0 => {
                let type_name = types[rng.gen_range(0..types.len())];
                alive.push(document.add_module(type_name, 0, 0).unwrap());
            }
            1 if !alive.is_empty() => {
                let id = alive.swap_remove(rng.gen_range(0..alive.len()));
                document.delete_module(id);
            }
            2 if alive.len() >= 2 => {
                let source = alive[rng.gen_range(0..alive.len())];
                let dest = alive[rng.gen_range(0..alive.len())];
                let connection = ConnectionId::new(
                    ModulePort::new(source, rng.gen_range(0..4)),
                    ModulePort::new(dest, rng.gen_range(0..4)),
                );
                let _ = document.create_connection(connection);
            }
            3 if !document.connections().is_empty() => {
                let index = rng.gen_range(0..document.connections().len());
                let connection = document.connections()[index];
                document.delete_connection(connection);
            }
            _ => {}
        }

        for connection in document.connections() {
            assert!(document.module(connection.source.module).is_some());
            assert!(document.module(connection.destination.module).is_some());
        }
    }
}

#[test]
fn dirty_flag_tracks_mutations() {
    let mut document = Document::new();
    assert!(!document.is_dirty());

    let id = document.add_module("Gain", 0, 0).unwrap();
    assert!(document.is_dirty());

    document.set_module_bounds(id, Bounds::new(5, 5, 120, 80));
    assert_eq!(document.module(id).unwrap().bounds, Bounds::new(5, 5, 120, 80));
    assert!(document.is_dirty());
}
