//! # Patchbay - Modular Node-Based Synthesis Engine
//!
//! Patchbay is a modular synthesizer core: an observable patch document,
//! a registry of DSP modules, and a real-time graph runtime that keeps a
//! live signal graph in lock-step with the document while rendering audio.
//!
//! ## Core Features
//!
//! - **Observable Document**: modules, connections, and display settings in
//!   one record tree with typed change events, dirty tracking, and JSON
//!   persistence
//! - **Graph Runtime**: a petgraph-scheduled render graph mirroring the
//!   document, updated lock-free between audio blocks
//! - **Module Registry**: eight module types (LFO, Impulse, Friction, Grit,
//!   String, Filter, Gain, Output) constructed by stable type name
//! - **Plug Gestures**: a pointer-gesture state machine that turns presses
//!   and releases on ports into validated connection edits
//! - **DSP Primitives**: delay lines, one-pole filters, a state-variable
//!   filter, and a tempo-syncable LFO
//!
//! ## Quick Start
//!
//! ```rust
//! use patchbay::document::{ConnectionId, Document, ModulePort};
//! use patchbay::graph::GraphRuntime;
//!
//! let mut document = Document::new();
//! let (runtime, mut render) = GraphRuntime::new(44_100.0, 512);
//! runtime.attach(&mut document);
//!
//! // Wire an impulse generator through a gain stage into the output sink.
//! let impulse = document.add_module("Impulse", 10, 20).unwrap();
//! let gain = document.add_module("Gain", 100, 20).unwrap();
//! let output = document.add_module("Output", 200, 20).unwrap();
//!
//! document
//!     .create_connection(ConnectionId::new(
//!         ModulePort::new(impulse, 0),
//!         ModulePort::new(gain, 0),
//!     ))
//!     .unwrap();
//! document
//!     .create_connection(ConnectionId::new(
//!         ModulePort::new(gain, 0),
//!         ModulePort::new(output, 0),
//!     ))
//!     .unwrap();
//!
//! runtime.set_parameter(impulse, "freq", 220.0);
//!
//! // Render one second of interleaved stereo audio.
//! let samples = render.render(44_100);
//! assert_eq!(samples.len(), 88_200);
//! ```

pub mod document;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod module;
pub mod modules;
pub mod plug;
pub mod registry;

pub use document::{Document, DocumentEvent, ModuleId};
pub use error::PatchError;
pub use graph::{GraphRuntime, RenderGraph};
pub use module::{BlockBuffer, ControlEvents, ModuleProcessor};
pub use plug::{PlugHandler, PlugId};
