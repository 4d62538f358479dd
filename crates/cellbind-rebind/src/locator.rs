//! Binding locator: find every slot holding a given object

use crate::binding::{BindingSet, SymbolBinding};
use crate::error::BindResult;
use crate::module::ModuleHandle;
use crate::object::Object;
use crate::walker::{walk, ModuleMap};

/// Find every slot in `modules` whose current value is `target`.
///
/// Matching is by identity. Only the modules' own attributes are inspected;
/// attributes that fail to read are skipped. An empty result is not an error.
pub fn locate(modules: &ModuleMap, target: &Object) -> BindingSet {
    let mut found = BindingSet::new();
    for (_, module) in modules.iter() {
        for name in module.attr_names() {
            match module.get_attr(&name) {
                Ok(value) if value.is_object(target) => {
                    found.push(SymbolBinding::attribute(module, name));
                }
                Ok(_) => {}
                Err(e) => log::trace!("skipping `{}.{}`: {}", module.name(), name, e),
            }
        }
    }
    log::debug!("located {} binding(s) of {:?}", found.len(), target);
    found
}

/// Walk from `root`, then locate `target`
pub fn locate_from(root: &ModuleHandle, target: &Object) -> BindResult<BindingSet> {
    Ok(locate(&walk(root)?, target))
}
