//! Scoped slot overrides
//!
//! An [`OverrideSession`] rebinds every slot of a [`BindingSet`] to a
//! replacement on entry and puts the original target back on exit. Dropping
//! a session that was never exited (early return, panic) restores as well.
//!
//! Slots held by a live session are claimed in a process-wide table; a second
//! session touching any of them is rejected instead of interleaving.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ahash::AHashSet;
use once_cell::sync::Lazy;

use crate::binding::{BindingSet, SlotKey};
use crate::error::{BindError, BindResult};
use crate::object::Object;

static ACTIVE_SLOTS: Lazy<Mutex<AHashSet<SlotKey>>> = Lazy::new(|| Mutex::new(AHashSet::new()));

fn active_slots() -> MutexGuard<'static, AHashSet<SlotKey>> {
    ACTIVE_SLOTS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live override of one binding set
#[must_use = "dropping the session restores the slots immediately"]
pub struct OverrideSession {
    target: Object,
    replacement: Object,
    bindings: BindingSet,
    claimed: Vec<SlotKey>,
    active: bool,
}

impl OverrideSession {
    /// Rebind every slot in `bindings` to `replacement`.
    ///
    /// The slots are assumed to hold `target`; this is not re-checked. If a
    /// slot cannot be rebound, the slots already rebound are restored and the
    /// error is returned.
    pub fn enter(target: &Object, replacement: &Object, bindings: &BindingSet) -> BindResult<Self> {
        let claimed = claim(bindings)?;
        let mut session = Self {
            target: target.clone(),
            replacement: replacement.clone(),
            bindings: bindings.clone(),
            claimed,
            active: true,
        };

        for (applied, binding) in bindings.iter().enumerate() {
            if let Err(e) = binding.set(session.replacement.clone()) {
                log::warn!("could not override `{}`: {}", binding, e);
                session.rollback(applied);
                return Err(e);
            }
        }

        log::debug!(
            "overriding {} slot(s) of {:?} with {:?}",
            session.bindings.len(),
            session.target,
            session.replacement
        );
        Ok(session)
    }

    /// Restore every slot and end the session.
    ///
    /// Every slot is attempted even when some fail; the first failure is
    /// reported as [`BindError::Restoration`].
    pub fn exit(mut self) -> BindResult<()> {
        self.restore()
    }

    /// Bindings held by this session
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    /// Whether the slots are still overridden
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn restore(&mut self) -> BindResult<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let total = self.bindings.len();
        let mut failed = 0;
        let mut first = None;
        for binding in self.bindings.iter() {
            if let Err(e) = binding.set(self.target.clone()) {
                log::error!("failed to restore `{}`: {}", binding, e);
                failed += 1;
                first.get_or_insert(e);
            }
        }
        self.release();

        match first {
            None => {
                log::debug!("restored {} slot(s) of {:?}", total, self.target);
                Ok(())
            }
            Some(first) => Err(BindError::Restoration {
                failed,
                total,
                first: Box::new(first),
            }),
        }
    }

    fn rollback(&mut self, applied: usize) {
        self.active = false;
        for binding in self.bindings.iter().take(applied) {
            if let Err(e) = binding.set(self.target.clone()) {
                log::error!("failed to roll back `{}`: {}", binding, e);
            }
        }
        self.release();
    }

    fn release(&mut self) {
        let mut active = active_slots();
        for key in self.claimed.drain(..) {
            active.remove(&key);
        }
    }
}

impl Drop for OverrideSession {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.restore() {
                log::error!("override session dropped with unrestored slots: {}", e);
            }
        }
    }
}

impl fmt::Debug for OverrideSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideSession")
            .field("target", &self.target)
            .field("replacement", &self.replacement)
            .field("bindings", &self.bindings)
            .field("active", &self.active)
            .finish()
    }
}

fn claim(bindings: &BindingSet) -> BindResult<Vec<SlotKey>> {
    let mut active = active_slots();
    if let Some(busy) = bindings.iter().find(|b| active.contains(&b.key())) {
        return Err(BindError::OverlappingSession(busy.to_string()));
    }

    let mut claimed = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let key = binding.key();
        if active.insert(key.clone()) {
            claimed.push(key);
        }
    }
    Ok(claimed)
}

/// Run `body` with every slot in `bindings` rebound to `replacement`.
///
/// Slots are restored however `body` exits. When both `body` and the
/// restoration fail, the restoration error wins and the body error is logged.
pub fn with_override<R, E, F>(
    target: &Object,
    replacement: &Object,
    bindings: &BindingSet,
    body: F,
) -> Result<R, E>
where
    F: FnOnce() -> Result<R, E>,
    E: From<BindError> + fmt::Display,
{
    let session = OverrideSession::enter(target, replacement, bindings)?;
    let result = body();
    match (result, session.exit()) {
        (result, Ok(())) => result,
        (Ok(_), Err(restore)) => Err(restore.into()),
        (Err(e), Err(restore)) => {
            log::error!("error inside override scope superseded by restoration failure: {}", e);
            Err(restore.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::SymbolBinding;
    use crate::module::{Module, ModuleHandle, Value};

    fn setup() -> (ModuleHandle, Object, Object, BindingSet) {
        let m = Module::new("m", "/session/m.rs");
        let f = Object::new("f");
        let f2 = Object::new("f2");
        m.set_attr("a", f.clone()).unwrap();
        m.set_attr("b", f.clone()).unwrap();
        let set = [SymbolBinding::attribute(&m, "a"), SymbolBinding::attribute(&m, "b")]
            .into_iter()
            .collect();
        (m, f, f2, set)
    }

    #[test]
    fn test_enter_and_exit() {
        let (m, f, f2, set) = setup();
        let session = OverrideSession::enter(&f, &f2, &set).unwrap();
        assert!(m.get_attr("a").unwrap().is_object(&f2));
        assert!(m.get_attr("b").unwrap().is_object(&f2));
        session.exit().unwrap();
        assert!(m.get_attr("a").unwrap().is_object(&f));
        assert!(m.get_attr("b").unwrap().is_object(&f));
    }

    #[test]
    fn test_drop_restores() {
        let (m, f, f2, set) = setup();
        {
            let _session = OverrideSession::enter(&f, &f2, &set).unwrap();
            assert!(m.get_attr("a").unwrap().is_object(&f2));
        }
        assert!(m.get_attr("a").unwrap().is_object(&f));
    }

    #[test]
    fn test_overlap_is_rejected_then_released() {
        let (m, f, f2, set) = setup();
        let session = OverrideSession::enter(&f, &f2, &set).unwrap();

        let partial: BindingSet = [SymbolBinding::attribute(&m, "b")].into_iter().collect();
        let err = OverrideSession::enter(&f, &Object::new("f3"), &partial).unwrap_err();
        assert!(matches!(err, BindError::OverlappingSession(ref s) if s == "m.b"));
        assert!(m.get_attr("b").unwrap().is_object(&f2));

        session.exit().unwrap();
        OverrideSession::enter(&f, &f2, &partial).unwrap().exit().unwrap();
    }

    #[test]
    fn test_partial_enter_rolls_back() {
        let m = Module::new("m", "/session/rollback.rs");
        let f = Object::new("f");
        m.set_attr("a", f.clone()).unwrap();
        m.define_getter("ro", || Ok(Value::Object(Object::new("x")))).unwrap();
        let set: BindingSet = [SymbolBinding::attribute(&m, "a"), SymbolBinding::attribute(&m, "ro")]
            .into_iter()
            .collect();

        let err = OverrideSession::enter(&f, &Object::new("f2"), &set).unwrap_err();
        assert!(matches!(err, BindError::ReadOnly { .. }));
        assert!(m.get_attr("a").unwrap().is_object(&f));
        // Claims were released.
        let only_a: BindingSet = [SymbolBinding::attribute(&m, "a")].into_iter().collect();
        OverrideSession::enter(&f, &Object::new("f2"), &only_a)
            .unwrap()
            .exit()
            .unwrap();
    }

    #[test]
    fn test_with_override_body_error_is_returned() {
        let (m, f, f2, set) = setup();
        let result: Result<(), BindError> = with_override(&f, &f2, &set, || {
            Err(BindError::UnknownOverridePoint("body".into()))
        });
        assert!(matches!(result, Err(BindError::UnknownOverridePoint(_))));
        assert!(m.get_attr("a").unwrap().is_object(&f));
    }

    #[test]
    fn test_restoration_failure_wins() {
        let (m, f, f2, set) = setup();
        let result: Result<(), BindError> = with_override(&f, &f2, &set, || {
            m.seal();
            Err(BindError::UnknownOverridePoint("body".into()))
        });
        m.unseal();
        match result {
            Err(BindError::Restoration { failed, total, first }) => {
                assert_eq!((failed, total), (2, 2));
                assert!(matches!(*first, BindError::Sealed(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

}
