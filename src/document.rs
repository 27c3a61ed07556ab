//! The patch document: an observable record tree of modules and connections.
//!
//! All edits go through the setters here. Each successful mutation marks the
//! document dirty and synchronously notifies every registered listener after
//! the change has been fully applied, so listeners always observe a
//! consistent post-state. Setters aimed at a missing ID are silent no-ops;
//! only `create_connection` and `add_module` can reject an edit outright.

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PatchError;
use crate::registry;

/// Opaque module identity. Monotonically increasing per document, never
/// reused while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One end of a connection: a port on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModulePort {
    pub module: ModuleId,
    pub port: u32,
}

impl ModulePort {
    pub fn new(module: ModuleId, port: u32) -> Self {
        Self { module, port }
    }
}

/// Connection identity is the ordered endpoint pair: source is always an
/// outlet, destination always an inlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    pub source: ModulePort,
    pub destination: ModulePort,
}

impl ConnectionId {
    pub fn new(source: ModulePort, destination: ModulePort) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn touches(&self, module: ModuleId) -> bool {
        self.source.module == module || self.destination.module == module
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Display colour, ARGB.
pub type Colour = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchCordType {
    S,
    Arc,
}

/// A module as the document sees it. Port names are copied out of the
/// registry at creation and never change afterwards.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub type_name: String,
    pub bounds: Bounds,
    pub enabled: bool,
    pub colour: Colour,
    pub inlets: &'static [&'static str],
    pub outlets: &'static [&'static str],
    pub is_output: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    ModuleAdded(ModuleId),
    ModuleDeleted(ModuleId),
    AllModulesDeleted,
    ModuleBoundsChanged(ModuleId, Bounds),
    ModuleEnabledChanged(ModuleId, bool),
    ModuleColourChanged(ModuleId, Colour),
    ConnectionCreated(ConnectionId),
    ConnectionDeleted(ConnectionId),
    ShowPortLabelsChanged(bool),
    PatchCordTypeChanged(PatchCordType),
    FileSaved(PathBuf),
    FileLoaded(PathBuf),
}

pub trait DocumentListener {
    fn document_changed(&mut self, document: &Document, event: &DocumentEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Produces the opaque engine-state section written into a patch file.
pub type EngineSerializer = Box<dyn FnMut(&Document) -> serde_json::Value>;

/// Consumes the engine-state section on load. The second argument is the
/// list of freshly assigned module IDs, in the file's module order, so the
/// engine can match its positional state back up.
pub type EngineDeserializer = Box<dyn FnMut(&serde_json::Value, &[ModuleId])>;

#[derive(Default)]
pub struct Document {
    modules: BTreeMap<ModuleId, ModuleRecord>,
    connections: Vec<ConnectionId>,
    show_port_labels: bool,
    patch_cord_type: Option<PatchCordType>,
    dirty: bool,
    next_module_id: u32,
    listeners: Vec<(ListenerId, Box<dyn DocumentListener>)>,
    next_listener_id: u64,
    engine_serializer: Option<EngineSerializer>,
    engine_deserializer: Option<EngineDeserializer>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // ===================== read surface =====================

    pub fn module(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(&id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn show_port_labels(&self) -> bool {
        self.show_port_labels
    }

    pub fn patch_cord_type(&self) -> PatchCordType {
        self.patch_cord_type.unwrap_or(PatchCordType::S)
    }

    // ===================== listeners =====================

    pub fn add_listener(&mut self, listener: Box<dyn DocumentListener>) -> ListenerId {
        self.next_listener_id += 1;
        let id = ListenerId(self.next_listener_id);
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    fn notify(&mut self, event: DocumentEvent) {
        // Listeners are taken out for the duration of the fan-out so each
        // callback can read the document through `&self`.
        let mut listeners = mem::take(&mut self.listeners);
        for (_, listener) in &mut listeners {
            listener.document_changed(self, &event);
        }
        // Listeners registered during a callback land behind the existing
        // ones.
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }

    // ===================== setters =====================

    pub fn add_module(&mut self, type_name: &str, x: i32, y: i32) -> Result<ModuleId, PatchError> {
        let spec = registry::find(type_name)
            .ok_or_else(|| PatchError::UnknownModuleType(type_name.to_owned()))?;

        self.next_module_id += 1;
        let id = ModuleId(self.next_module_id);
        self.modules.insert(
            id,
            ModuleRecord {
                id,
                type_name: spec.name.to_owned(),
                bounds: Bounds::new(x, y, 0, 0),
                enabled: true,
                colour: 0xff9b9b9b,
                inlets: spec.inlets,
                outlets: spec.outlets,
                is_output: spec.is_output,
            },
        );

        self.dirty = true;
        self.notify(DocumentEvent::ModuleAdded(id));
        Ok(id)
    }

    /// Deletes a module and, in cascade, every connection touching it.
    /// A second call on the same ID is a no-op.
    pub fn delete_module(&mut self, id: ModuleId) {
        if self.modules.remove(&id).is_none() {
            return;
        }

        let removed: Vec<ConnectionId> = self
            .connections
            .iter()
            .copied()
            .filter(|connection| connection.touches(id))
            .collect();
        self.connections.retain(|connection| !connection.touches(id));

        self.dirty = true;
        self.notify(DocumentEvent::ModuleDeleted(id));
        for connection in removed {
            self.notify(DocumentEvent::ConnectionDeleted(connection));
        }
    }

    pub fn delete_all_modules(&mut self) {
        if self.modules.is_empty() && self.connections.is_empty() {
            return;
        }
        self.modules.clear();
        self.connections.clear();
        self.dirty = true;
        self.notify(DocumentEvent::AllModulesDeleted);
    }

    pub fn set_module_bounds(&mut self, id: ModuleId, bounds: Bounds) {
        let Some(record) = self.modules.get_mut(&id) else {
            return;
        };
        record.bounds = bounds;
        self.dirty = true;
        self.notify(DocumentEvent::ModuleBoundsChanged(id, bounds));
    }

    pub fn set_module_enabled(&mut self, id: ModuleId, enabled: bool) {
        let Some(record) = self.modules.get_mut(&id) else {
            return;
        };
        record.enabled = enabled;
        self.dirty = true;
        self.notify(DocumentEvent::ModuleEnabledChanged(id, enabled));
    }

    pub fn set_module_colour(&mut self, id: ModuleId, colour: Colour) {
        let Some(record) = self.modules.get_mut(&id) else {
            return;
        };
        record.colour = colour;
        self.dirty = true;
        self.notify(DocumentEvent::ModuleColourChanged(id, colour));
    }

    /// Validates and records a connection. The edit is rejected, with no
    /// state change and no event, when it would form a self-loop, reference
    /// a missing module or port, or claim an inlet that already has a
    /// source.
    pub fn create_connection(&mut self, connection: ConnectionId) -> Result<(), PatchError> {
        let source = self
            .modules
            .get(&connection.source.module)
            .ok_or(PatchError::InvalidConnection("unknown source module"))?;
        let destination = self
            .modules
            .get(&connection.destination.module)
            .ok_or(PatchError::InvalidConnection("unknown destination module"))?;

        if connection.source.module == connection.destination.module {
            return Err(PatchError::InvalidConnection("self loop"));
        }
        if connection.source.port as usize >= source.outlets.len() {
            return Err(PatchError::InvalidConnection("no such outlet"));
        }
        if connection.destination.port as usize >= destination.inlets.len() {
            return Err(PatchError::InvalidConnection("no such inlet"));
        }
        if self
            .connections
            .iter()
            .any(|existing| existing.destination == connection.destination)
        {
            return Err(PatchError::InvalidConnection("inlet already connected"));
        }

        self.connections.push(connection);
        self.dirty = true;
        self.notify(DocumentEvent::ConnectionCreated(connection));
        Ok(())
    }

    pub fn delete_connection(&mut self, connection: ConnectionId) {
        let Some(index) = self
            .connections
            .iter()
            .position(|existing| *existing == connection)
        else {
            return;
        };
        self.connections.remove(index);
        self.dirty = true;
        self.notify(DocumentEvent::ConnectionDeleted(connection));
    }

    pub fn set_show_port_labels(&mut self, show: bool) {
        self.show_port_labels = show;
        self.dirty = true;
        self.notify(DocumentEvent::ShowPortLabelsChanged(show));
    }

    pub fn set_patch_cord_type(&mut self, cord_type: PatchCordType) {
        self.patch_cord_type = Some(cord_type);
        self.dirty = true;
        self.notify(DocumentEvent::PatchCordTypeChanged(cord_type));
    }

    // ===================== persistence =====================

    /// Registers the callbacks that produce and consume the opaque engine
    /// section of a patch file. Must be called before `save` or `load`.
    pub fn register_engine_state(
        &mut self,
        serializer: EngineSerializer,
        deserializer: EngineDeserializer,
    ) {
        self.engine_serializer = Some(serializer);
        self.engine_deserializer = Some(deserializer);
    }

    pub fn save(&mut self, path: &Path) -> Result<(), PatchError> {
        let mut serializer = self
            .engine_serializer
            .take()
            .expect("engine serializer not registered before save");
        let engine = serializer(self);
        self.engine_serializer = Some(serializer);

        let file = PatchFile {
            document: DocumentSection {
                show_port_labels: self.show_port_labels,
                patch_cord_type: self.patch_cord_type,
                modules: self
                    .modules
                    .values()
                    .map(|record| ModuleEntry {
                        id: record.id.to_string(),
                        type_name: record.type_name.clone(),
                        bounds: [
                            record.bounds.x,
                            record.bounds.y,
                            record.bounds.width,
                            record.bounds.height,
                        ],
                        colour: format!("{:08x}", record.colour),
                        enabled: record.enabled,
                    })
                    .collect(),
                connections: self
                    .connections
                    .iter()
                    .map(|connection| ConnectionEntry {
                        source_module: connection.source.module.to_string(),
                        source_port: connection.source.port,
                        dest_module: connection.destination.module.to_string(),
                        dest_port: connection.destination.port,
                    })
                    .collect(),
            },
            engine,
        };

        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        self.dirty = false;
        self.notify(DocumentEvent::FileSaved(path.to_owned()));
        Ok(())
    }

    /// Replaces the document contents with the file's. Module identity is
    /// preserved positionally: the Nth module in the file becomes the Nth
    /// freshly assigned ID, and connection endpoints are remapped through
    /// that correspondence. Every module fires an ordinary `ModuleAdded`, so
    /// the runtime needs no special bulk-load path. A failed parse leaves
    /// the document, and its dirty flag, untouched.
    pub fn load(&mut self, path: &Path) -> Result<(), PatchError> {
        let mut deserializer = self
            .engine_deserializer
            .take()
            .expect("engine deserializer not registered before load");
        let result = self.load_inner(path, &mut deserializer);
        self.engine_deserializer = Some(deserializer);
        result
    }

    fn load_inner(
        &mut self,
        path: &Path,
        deserializer: &mut EngineDeserializer,
    ) -> Result<(), PatchError> {
        let text = std::fs::read_to_string(path)?;
        let file: PatchFile = serde_json::from_str(&text)?;

        self.delete_all_modules();

        // Positional correspondence: file order maps onto newly assigned
        // IDs. Unknown module types are skipped with a warning, which
        // shifts nothing — the remap table records a hole instead.
        let mut assigned: Vec<Option<ModuleId>> = Vec::with_capacity(file.document.modules.len());
        let mut remap: BTreeMap<String, ModuleId> = BTreeMap::new();
        for entry in &file.document.modules {
            match self.add_module(&entry.type_name, entry.bounds[0], entry.bounds[1]) {
                Ok(id) => {
                    self.set_module_bounds(
                        id,
                        Bounds::new(
                            entry.bounds[0],
                            entry.bounds[1],
                            entry.bounds[2],
                            entry.bounds[3],
                        ),
                    );
                    self.set_module_enabled(id, entry.enabled);
                    if let Ok(colour) = Colour::from_str_radix(&entry.colour, 16) {
                        self.set_module_colour(id, colour);
                    }
                    remap.insert(entry.id.clone(), id);
                    assigned.push(Some(id));
                }
                Err(error) => {
                    warn!(%error, type_name = %entry.type_name, "skipping module on load");
                    assigned.push(None);
                }
            }
        }

        for entry in &file.document.connections {
            let (Some(&source), Some(&dest)) =
                (remap.get(&entry.source_module), remap.get(&entry.dest_module))
            else {
                warn!(
                    source = %entry.source_module,
                    dest = %entry.dest_module,
                    "skipping connection with unmapped endpoint"
                );
                continue;
            };
            let connection = ConnectionId::new(
                ModulePort::new(source, entry.source_port),
                ModulePort::new(dest, entry.dest_port),
            );
            if let Err(error) = self.create_connection(connection) {
                warn!(%error, "skipping invalid connection on load");
            }
        }

        self.set_show_port_labels(file.document.show_port_labels);
        if let Some(cord_type) = file.document.patch_cord_type {
            self.set_patch_cord_type(cord_type);
        }

        // The engine section is decoded independently: garbage here must
        // not undo the document section that just loaded.
        let ids: Vec<ModuleId> = assigned.iter().filter_map(|id| *id).collect();
        deserializer(&file.engine, &ids);

        self.dirty = false;
        self.notify(DocumentEvent::FileLoaded(path.to_owned()));
        Ok(())
    }
}

// Patch file is a single JSON object with two sibling sections; the
// "engine" side stays an opaque value as far as the document is concerned.
#[derive(Serialize, Deserialize)]
struct PatchFile {
    document: DocumentSection,
    #[serde(default)]
    engine: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct DocumentSection {
    #[serde(default)]
    show_port_labels: bool,
    #[serde(default)]
    patch_cord_type: Option<PatchCordType>,
    modules: Vec<ModuleEntry>,
    #[serde(default)]
    connections: Vec<ConnectionEntry>,
}

#[derive(Serialize, Deserialize)]
struct ModuleEntry {
    id: String,
    #[serde(rename = "type")]
    type_name: String,
    bounds: [i32; 4],
    colour: String,
    enabled: bool,
}

#[derive(Serialize, Deserialize)]
struct ConnectionEntry {
    source_module: String,
    source_port: u32,
    dest_module: String,
    dest_port: u32,
}
