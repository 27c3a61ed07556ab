//! The static module catalogue.
//!
//! Maps stable type names to port metadata, parameter descriptors and a
//! factory. Enumeration order is the fixed display order used by menus and
//! scripting collaborators. All metadata is queryable without instantiating
//! a live processor.

use crate::error::PatchError;
use crate::module::{ModuleProcessor, ParamSet, ParamSpec};
use crate::modules;

/// One catalogue entry: everything a collaborator can know about a module
/// type without constructing it.
pub struct ModuleSpec {
    pub name: &'static str,
    pub inlets: &'static [&'static str],
    pub outlets: &'static [&'static str],
    /// Output modules are auto-wired to the device sink by the runtime.
    pub is_output: bool,
    pub params: &'static [ParamSpec],
    pub(crate) build: fn(&ParamSet) -> Box<dyn ModuleProcessor>,
}

impl ModuleSpec {
    /// Width of the processing buffer: inlets and outlets share channels.
    pub fn channel_count(&self) -> usize {
        self.inlets.len().max(self.outlets.len())
    }
}

/// Every known module type, in display order.
pub static MODULES: &[&ModuleSpec] = &[
    &modules::lfo::SPEC,
    &modules::impulse::SPEC,
    &modules::friction::SPEC,
    &modules::grit::SPEC,
    &modules::string::SPEC,
    &modules::filter::SPEC,
    &modules::gain::SPEC,
    &modules::output::SPEC,
];

pub fn modules() -> impl Iterator<Item = &'static ModuleSpec> {
    MODULES.iter().copied()
}

pub fn find(name: &str) -> Option<&'static ModuleSpec> {
    MODULES.iter().copied().find(|spec| spec.name == name)
}

/// Constructs a live processor and its parameter bank for `name`.
pub fn create(name: &str) -> Result<(Box<dyn ModuleProcessor>, ParamSet), PatchError> {
    let spec = find(name).ok_or_else(|| PatchError::UnknownModuleType(name.to_string()))?;
    let params = ParamSet::new(spec.params);
    let processor = (spec.build)(&params);
    Ok((processor, params))
}
