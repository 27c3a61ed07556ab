//! The audio graph runtime.
//!
//! Split across the two execution contexts: `GraphRuntime` lives on the
//! control context, listens to the document and precompiles every topology
//! change into a complete [`GraphUpdate`]; `RenderGraph` lives on the render
//! context and drains those updates only between blocks, so a hardware
//! callback never observes a half-applied graph. Updates travel over an
//! unbounded crossbeam channel, whose FIFO order preserves edit order.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam::channel::{unbounded, Receiver, Sender};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{error, warn};

use crate::document::{
    ConnectionId, Document, DocumentEvent, DocumentListener, ModuleId,
};
use crate::module::{BlockBuffer, ControlEvents, ModuleProcessor, ParamSet};
use crate::registry;

/// The number of device channels the fixed output sink exposes.
pub const SINK_CHANNELS: usize = 2;

/// One precompiled change, applied by the render side between blocks.
pub enum GraphUpdate {
    AddNode {
        id: ModuleId,
        channels: usize,
        processor: Box<dyn ModuleProcessor>,
    },
    RemoveNode(ModuleId),
    RemoveAll,
    Schedule(RenderSchedule),
}

/// A single inlet feed: copy `source_port` of `source` into `dest_port` of
/// the step's node before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRoute {
    pub source: ModuleId,
    pub source_port: u32,
    pub dest_port: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStep {
    pub node: ModuleId,
    pub enabled: bool,
    pub inputs: Vec<InputRoute>,
}

/// A fully-built execution plan: steps in topological order plus the 1:1
/// channel taps feeding the device sink from every output-flagged node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSchedule {
    pub steps: Vec<RenderStep>,
    pub sink_taps: Vec<SinkTap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkTap {
    pub node: ModuleId,
    pub channel: usize,
    pub sink_channel: usize,
}

struct NodeInfo {
    channels: usize,
    inlet_count: usize,
    outlet_count: usize,
    is_output: bool,
    enabled: bool,
}

/// Control-context mirror of the live topology.
struct ControlState {
    sender: Sender<GraphUpdate>,
    nodes: BTreeMap<ModuleId, NodeInfo>,
    params: BTreeMap<ModuleId, ParamSet>,
    edges: Vec<ConnectionId>,
}

impl ControlState {
    fn add_module(&mut self, document: &Document, id: ModuleId) {
        let Some(record) = document.module(id) else {
            return;
        };
        // The document only admits registered type names, so construction
        // cannot miss here; failing loudly in logs beats a dead node.
        let Some(spec) = registry::find(&record.type_name) else {
            error!(type_name = %record.type_name, "module type not in registry");
            return;
        };
        let (processor, params) = match registry::create(&record.type_name) {
            Ok(built) => built,
            Err(err) => {
                error!(%err, "cannot instantiate module");
                return;
            }
        };

        self.nodes.insert(
            id,
            NodeInfo {
                channels: spec.channel_count(),
                inlet_count: spec.inlets.len(),
                outlet_count: spec.outlets.len(),
                is_output: spec.is_output,
                enabled: record.enabled,
            },
        );
        self.params.insert(id, params);

        let _ = self.sender.send(GraphUpdate::AddNode {
            id,
            channels: spec.channel_count(),
            processor,
        });
        self.push_schedule();
    }

    fn remove_module(&mut self, id: ModuleId) {
        if self.nodes.remove(&id).is_none() {
            return;
        }
        self.params.remove(&id);
        self.edges.retain(|edge| !edge.touches(id));
        let _ = self.sender.send(GraphUpdate::RemoveNode(id));
        self.push_schedule();
    }

    fn remove_all(&mut self) {
        self.nodes.clear();
        self.params.clear();
        self.edges.clear();
        let _ = self.sender.send(GraphUpdate::RemoveAll);
        self.push_schedule();
    }

    fn add_edge(&mut self, connection: ConnectionId) {
        if !self.edges.contains(&connection) {
            self.edges.push(connection);
        }
        self.push_schedule();
    }

    fn remove_edge(&mut self, connection: ConnectionId) {
        self.edges.retain(|edge| *edge != connection);
        self.push_schedule();
    }

    fn set_enabled(&mut self, id: ModuleId, enabled: bool) {
        if let Some(info) = self.nodes.get_mut(&id) {
            info.enabled = enabled;
            self.push_schedule();
        }
    }

    fn push_schedule(&self) {
        let _ = self
            .sender
            .send(GraphUpdate::Schedule(self.compile_schedule()));
    }

    /// Builds the execution plan: admit edges in insertion order, skipping
    /// any edge that references a missing module or port or that would
    /// close a cycle, then order the nodes topologically.
    fn compile_schedule(&self) -> RenderSchedule {
        let mut graph: DiGraph<ModuleId, ()> = DiGraph::new();
        let mut indices: HashMap<ModuleId, NodeIndex> = HashMap::new();
        for &id in self.nodes.keys() {
            indices.insert(id, graph.add_node(id));
        }

        let mut accepted: Vec<ConnectionId> = Vec::new();
        for edge in &self.edges {
            let (Some(&source_idx), Some(&dest_idx)) = (
                indices.get(&edge.source.module),
                indices.get(&edge.destination.module),
            ) else {
                continue;
            };
            let (source, dest) = match (
                self.nodes.get(&edge.source.module),
                self.nodes.get(&edge.destination.module),
            ) {
                (Some(source), Some(dest)) => (source, dest),
                _ => continue,
            };
            if edge.source.port as usize >= source.outlet_count
                || edge.destination.port as usize >= dest.inlet_count
            {
                continue;
            }
            if has_path_connecting(&graph, dest_idx, source_idx, None) {
                warn!(%edge.source.module, %edge.destination.module, "pruning cycle-forming edge");
                continue;
            }
            graph.add_edge(source_idx, dest_idx, ());
            accepted.push(*edge);
        }

        let order = match toposort(&graph, None) {
            Ok(order) => order,
            // Unreachable once cycle-forming edges are pruned above.
            Err(_) => {
                error!("topological sort failed after pruning");
                self.nodes.keys().map(|id| indices[id]).collect()
            }
        };

        let steps = order
            .into_iter()
            .map(|index| {
                let node = graph[index];
                let info = &self.nodes[&node];
                RenderStep {
                    node,
                    enabled: info.enabled,
                    inputs: accepted
                        .iter()
                        .filter(|edge| edge.destination.module == node)
                        .map(|edge| InputRoute {
                            source: edge.source.module,
                            source_port: edge.source.port,
                            dest_port: edge.destination.port,
                        })
                        .collect(),
                }
            })
            .collect();

        // Every output-flagged node feeds the sink 1:1 by channel index,
        // independent of user-made connections.
        let sink_taps = self
            .nodes
            .iter()
            .filter(|(_, info)| info.is_output && info.enabled)
            .flat_map(|(&node, info)| {
                (0..info.channels.min(SINK_CHANNELS)).map(move |channel| SinkTap {
                    node,
                    channel,
                    sink_channel: channel,
                })
            })
            .collect();

        RenderSchedule { steps, sink_taps }
    }
}

struct RuntimeListener {
    control: Rc<RefCell<ControlState>>,
}

impl DocumentListener for RuntimeListener {
    fn document_changed(&mut self, document: &Document, event: &DocumentEvent) {
        let mut control = self.control.borrow_mut();
        match event {
            DocumentEvent::ModuleAdded(id) => control.add_module(document, *id),
            DocumentEvent::ModuleDeleted(id) => control.remove_module(*id),
            DocumentEvent::AllModulesDeleted => control.remove_all(),
            DocumentEvent::ConnectionCreated(connection) => control.add_edge(*connection),
            DocumentEvent::ConnectionDeleted(connection) => control.remove_edge(*connection),
            DocumentEvent::ModuleEnabledChanged(id, enabled) => {
                control.set_enabled(*id, *enabled)
            }
            _ => {}
        }
    }
}

/// Control-context handle to the runtime: parameter and transport setters,
/// plus the document attachment that keeps the live graph in lock-step.
pub struct GraphRuntime {
    control: Rc<RefCell<ControlState>>,
    events: Arc<ArcSwap<ControlEvents>>,
}

impl GraphRuntime {
    pub fn new(sample_rate: f64, max_block: usize) -> (Self, RenderGraph) {
        let (sender, receiver) = unbounded();
        let events = Arc::new(ArcSwap::from_pointee(ControlEvents::default()));

        let runtime = Self {
            control: Rc::new(RefCell::new(ControlState {
                sender,
                nodes: BTreeMap::new(),
                params: BTreeMap::new(),
                edges: Vec::new(),
            })),
            events: Arc::clone(&events),
        };
        let render = RenderGraph {
            receiver,
            nodes: HashMap::new(),
            schedule: RenderSchedule::default(),
            scratch: BlockBuffer::new(0, max_block),
            events,
            sample_rate,
            max_block,
        };
        (runtime, render)
    }

    /// Subscribes to the document and registers the engine-state
    /// serializer pair, so `save`/`load` carry parameter values.
    pub fn attach(&self, document: &mut Document) {
        document.add_listener(Box::new(RuntimeListener {
            control: Rc::clone(&self.control),
        }));

        let serialize_control = Rc::clone(&self.control);
        let deserialize_control = Rc::clone(&self.control);
        document.register_engine_state(
            Box::new(move |document: &Document| {
                let control = serialize_control.borrow();
                // Positional: one entry per document module, in document
                // order, mapping parameter name to value.
                let entries: Vec<serde_json::Value> = document
                    .modules()
                    .map(|record| {
                        let mut map = serde_json::Map::new();
                        if let Some(params) = control.params.get(&record.id) {
                            for (name, value) in params.values() {
                                map.insert(name.to_owned(), serde_json::json!(value));
                            }
                        }
                        serde_json::Value::Object(map)
                    })
                    .collect();
                serde_json::Value::Array(entries)
            }),
            Box::new(move |value: &serde_json::Value, ids: &[ModuleId]| {
                let Some(entries) = value.as_array() else {
                    if !value.is_null() {
                        warn!("malformed engine section ignored");
                    }
                    return;
                };
                let control = deserialize_control.borrow();
                for (id, entry) in ids.iter().zip(entries) {
                    let Some(map) = entry.as_object() else {
                        continue;
                    };
                    let Some(params) = control.params.get(id) else {
                        continue;
                    };
                    for (name, value) in map {
                        if let Some(value) = value.as_f64() {
                            params.set(name, value as f32);
                        }
                    }
                }
            }),
        );
    }

    /// Writes a parameter value into the module's atomic cell. Returns
    /// false when the module or parameter does not exist.
    pub fn set_parameter(&self, id: ModuleId, name: &str, value: f32) -> bool {
        self.control
            .borrow()
            .params
            .get(&id)
            .map(|params| params.set(name, value))
            .unwrap_or(false)
    }

    pub fn parameter(&self, id: ModuleId, name: &str) -> Option<f32> {
        self.control.borrow().params.get(&id)?.get(name)
    }

    pub fn set_tempo(&self, tempo_bpm: f64) {
        let mut events = ControlEvents::clone(&self.events.load());
        events.tempo_bpm = tempo_bpm;
        self.events.store(Arc::new(events));
    }

    pub fn set_transport_ppq(&self, ppq_position: Option<f64>) {
        let mut events = ControlEvents::clone(&self.events.load());
        events.ppq_position = ppq_position;
        self.events.store(Arc::new(events));
    }
}

struct LiveNode {
    processor: Box<dyn ModuleProcessor>,
    buffer: BlockBuffer,
}

/// Render-context half: owns the live processors and executes the current
/// schedule once per block. Pending updates are consumed only at block
/// boundaries; the steady-state path never locks or allocates.
pub struct RenderGraph {
    receiver: Receiver<GraphUpdate>,
    nodes: HashMap<ModuleId, LiveNode>,
    schedule: RenderSchedule,
    scratch: BlockBuffer,
    events: Arc<ArcSwap<ControlEvents>>,
    sample_rate: f64,
    max_block: usize,
}

impl RenderGraph {
    pub fn max_block(&self) -> usize {
        self.max_block
    }

    fn apply_updates(&mut self) {
        for update in self.receiver.try_iter() {
            match update {
                GraphUpdate::AddNode {
                    id,
                    channels,
                    processor,
                } => {
                    let mut node = LiveNode {
                        processor,
                        buffer: BlockBuffer::new(channels, self.max_block),
                    };
                    node.processor.prepare(self.sample_rate, self.max_block);
                    if channels > self.scratch.num_channels() {
                        self.scratch = BlockBuffer::new(channels, self.max_block);
                    }
                    self.nodes.insert(id, node);
                }
                GraphUpdate::RemoveNode(id) => {
                    if let Some(mut node) = self.nodes.remove(&id) {
                        node.processor.release_resources();
                    }
                }
                GraphUpdate::RemoveAll => {
                    for node in self.nodes.values_mut() {
                        node.processor.release_resources();
                    }
                    self.nodes.clear();
                    self.schedule = RenderSchedule::default();
                }
                GraphUpdate::Schedule(schedule) => self.schedule = schedule,
            }
        }
    }

    /// Renders one block into the two device channels.
    pub fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        debug_assert!(left.len() <= self.max_block);

        self.apply_updates();
        let events = self.events.load_full();
        let num_samples = left.len().min(self.max_block);

        left.fill(0.0);
        right.fill(0.0);

        for step in &self.schedule.steps {
            if !self.nodes.contains_key(&step.node) {
                continue;
            }

            // Stage connected inlet data in the scratch buffer first, so
            // source buffers are only borrowed immutably.
            self.scratch.set_len(num_samples);
            self.scratch.clear();
            if step.enabled {
                for route in &step.inputs {
                    let Some(source) = self.nodes.get(&route.source) else {
                        continue;
                    };
                    if route.source_port as usize >= source.buffer.num_channels()
                        || route.dest_port as usize >= self.scratch.num_channels()
                    {
                        continue;
                    }
                    self.scratch
                        .channel_mut(route.dest_port as usize)
                        .copy_from_slice(&source.buffer.channel(route.source_port as usize));
                }
            }

            let Some(node) = self.nodes.get_mut(&step.node) else {
                continue;
            };
            node.buffer.set_len(num_samples);
            node.buffer.clear();
            for route in &step.inputs {
                let dest = route.dest_port as usize;
                if dest < node.buffer.num_channels() && dest < self.scratch.num_channels() {
                    node.buffer
                        .channel_mut(dest)
                        .copy_from_slice(self.scratch.channel(dest));
                }
            }

            if !step.enabled {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                node.processor.process(&mut node.buffer, &events);
            }));
            if result.is_err() {
                // Substitute silence for the faulting node and keep going;
                // the callback must survive.
                node.buffer.clear();
                error!(module = %step.node, "render fault, substituting silence");
            }
        }

        for tap in &self.schedule.sink_taps {
            let Some(node) = self.nodes.get(&tap.node) else {
                continue;
            };
            if tap.channel >= node.buffer.num_channels() {
                continue;
            }
            let out = if tap.sink_channel == 0 {
                &mut *left
            } else {
                &mut *right
            };
            for (out_sample, tapped) in out.iter_mut().zip(node.buffer.channel(tap.channel)) {
                *out_sample += tapped;
            }
        }
    }

    /// Offline render helper: produces `num_samples` interleaved stereo
    /// frames by running whole blocks back to back.
    pub fn render(&mut self, num_samples: usize) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(num_samples * SINK_CHANNELS);
        let mut left = vec![0.0f32; self.max_block];
        let mut right = vec![0.0f32; self.max_block];

        let mut remaining = num_samples;
        while remaining > 0 {
            let n = remaining.min(self.max_block);
            self.render_block(&mut left[..n], &mut right[..n]);
            for i in 0..n {
                interleaved.push(left[i]);
                interleaved.push(right[i]);
            }
            remaining -= n;
        }
        interleaved
    }
}
