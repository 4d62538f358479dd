//! End-to-end override scenarios (build graph -> locate -> override -> restore)

use cellbind_rebind::{
    locate_from, with_override, BindError, BindingCache, Module, ModuleHandle, Object,
    OverrideSession,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Two modules importing the same function under different names
fn two_importers(dir: &str) -> (ModuleHandle, ModuleHandle, ModuleHandle, Object) {
    let root = Module::new("pkg", format!("/{}/pkg/lib.rs", dir));
    let m1 = Module::new("pkg::m1", format!("/{}/pkg/m1.rs", dir));
    let m2 = Module::new("pkg::m2", format!("/{}/pkg/nested/m2.rs", dir));
    let f = Object::new(|x: f64| x * 2.0);

    root.set_attr("m1", m1.clone()).unwrap();
    root.set_attr("m2", m2.clone()).unwrap();
    m1.set_attr("g", f.clone()).unwrap();
    m2.set_attr("h", f.clone()).unwrap();
    // Cycle back to the root
    m2.set_attr("parent", root.clone()).unwrap();

    (root, m1, m2, f)
}

/// M1.g and M2.h point at `f`; both see `f2` inside the scope only
#[test]
fn test_two_importers_are_overridden_and_restored() {
    let (root, m1, m2, f) = two_importers("scenario");
    let f2 = Object::new(|x: f64| x * 3.0);

    let bindings = locate_from(&root, &f).unwrap();
    assert_eq!(bindings.names(), vec!["pkg::m1.g", "pkg::m2.h"]);
    assert!(bindings.contains(&m1, "g"));
    assert!(bindings.contains(&m2, "h"));

    with_override(&f, &f2, &bindings, || {
        assert!(m1.get_attr("g")?.is_object(&f2));
        assert!(m2.get_attr("h")?.is_object(&f2));
        Ok::<_, BindError>(())
    })
    .unwrap();

    assert!(m1.get_attr("g").unwrap().is_object(&f));
    assert!(m2.get_attr("h").unwrap().is_object(&f));
    assert_eq!(locate_from(&root, &f).unwrap(), bindings);
}

/// Slots are restored when the protected region panics
#[test]
fn test_restored_after_panic() {
    let (root, m1, _m2, f) = two_importers("panic");
    let f2 = Object::new(0_u8);
    let bindings = locate_from(&root, &f).unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _session = OverrideSession::enter(&f, &f2, &bindings).unwrap();
        assert!(m1.get_attr("g").unwrap().is_object(&f2));
        panic!("failure inside the override scope");
    }));

    assert!(outcome.is_err());
    assert_eq!(locate_from(&root, &f).unwrap(), bindings);
}

/// A session on slots already overridden is rejected
#[test]
fn test_nested_session_on_same_target_is_rejected() {
    let (root, m1, _m2, f) = two_importers("nested");
    let bindings = locate_from(&root, &f).unwrap();

    let result = with_override(&f, &Object::new(1_u8), &bindings, || {
        let inner = OverrideSession::enter(&f, &Object::new(2_u8), &bindings);
        assert!(matches!(inner, Err(BindError::OverlappingSession(_))));
        Ok::<_, BindError>(())
    });

    assert!(result.is_ok());
    assert!(m1.get_attr("g").unwrap().is_object(&f));
}

/// Every slot is attempted when restoring; the first failure is reported
#[test]
fn test_restoration_failure_is_reported() {
    let (root, m1, m2, f) = two_importers("restore");
    let f2 = Object::new(0_u8);
    let bindings = locate_from(&root, &f).unwrap();

    let session = OverrideSession::enter(&f, &f2, &bindings).unwrap();
    m1.seal();
    let err = session.exit().unwrap_err();
    m1.unseal();

    match err {
        BindError::Restoration {
            failed,
            total,
            first,
        } => {
            assert_eq!((failed, total), (1, 2));
            assert!(matches!(*first, BindError::Sealed(ref m) if m == "pkg::m1"));
        }
        other => panic!("expected restoration failure, got {other:?}"),
    }
    // The unsealed module was still restored.
    assert!(m2.get_attr("h").unwrap().is_object(&f));
}

/// A broken attribute only hides itself
#[test]
fn test_broken_attribute_does_not_hide_others() {
    let (root, m1, _m2, f) = two_importers("broken");
    m1.define_getter("a_lazy", || Err("import failed".to_string()))
        .unwrap();

    let bindings = locate_from(&root, &f).unwrap();
    assert_eq!(bindings.len(), 2);
}

/// Cached lookup on an unchanged graph returns the same content
#[test]
fn test_cache_idempotence() {
    let (root, _m1, _m2, f) = two_importers("cache");
    let cache = BindingCache::new();

    let first = cache.lookup_or_compute(&root, &f).unwrap();
    let second = cache.lookup_or_compute(&root, &f).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
}

proptest! {
    /// After any session over any subset of slots, the locator finds the
    /// original bindings again
    #[test]
    fn prop_slots_restored(
        holders in proptest::collection::vec(any::<bool>(), 1..12),
        fail_inside in any::<bool>(),
    ) {
        let root = Module::new("prop", "/prop/pkg/lib.rs");
        let child = Module::new("prop::child", "/prop/pkg/child.rs");
        root.set_attr("child", child.clone()).unwrap();

        let target = Object::new(String::from("target"));
        let decoy = Object::new(String::from("target"));
        for (i, holds) in holders.iter().enumerate() {
            let module = if i % 2 == 0 { &root } else { &child };
            let value = if *holds { target.clone() } else { decoy.clone() };
            module.set_attr(&format!("slot{i}"), value).unwrap();
        }

        let before = locate_from(&root, &target).unwrap();
        prop_assert_eq!(before.len(), holders.iter().filter(|h| **h).count());

        let replacement = Object::new(String::from("replacement"));
        let result: Result<usize, BindError> = with_override(&target, &replacement, &before, || {
            let inside = locate_from(&root, &replacement)?.len();
            if fail_inside {
                return Err(BindError::UnknownOverridePoint("inside".into()));
            }
            Ok(inside)
        });
        match result {
            Ok(inside) => prop_assert_eq!(inside, before.len()),
            Err(e) => prop_assert!(fail_inside && e.is_lookup_failure()),
        }

        let after = locate_from(&root, &target).unwrap();
        prop_assert_eq!(after, before);
        prop_assert!(locate_from(&root, &replacement).unwrap().is_empty());
    }
}
