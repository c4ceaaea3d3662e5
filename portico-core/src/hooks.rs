//! Hook registry (spec §4.4): a keyed aggregation store plus a list of
//! handler-extract callbacks, generalized from `r2e_core::meta::MetaRegistry`
//! (a type-erased `Vec<M>` keyed by `TypeId`) to also carry contributor
//! callbacks that run at first handler extraction.
//!
//! Three independent things live here:
//!
//! - **Aggregation**: any number of independent call sites can [`push`] a
//!   value of some type `T` (service names, OpenAPI operations, ...) and
//!   later [`drain`] all of them — e.g. the typed-OpenAPI adapter collecting
//!   every registered operation before rendering the document. [`snapshot`]
//!   is the non-destructive counterpart, for a bucket more than one
//!   subsystem needs to read (the RPC scope's health/reflection wiring and
//!   the gateway router both need the full service-name list).
//! - **Handler-extract hooks**: closures registered with
//!   [`on_handler_extract`] run against the root [`Mux`] every time
//!   `Server::handler` (or the higher-level `Server::serve*` family) is
//!   called. The spec leaves one-shot idempotence to the contributor; an
//!   [`HookOptions::once`] flag is offered as a convenience for the common
//!   case instead of every contributor hand-rolling an `AtomicBool`.
//! - **Startup hooks**: closures registered with [`on_startup`] run once,
//!   in registration order, against the root `Mux` right before
//!   `Server::serve_context` starts accepting connections — after handler
//!   extraction has run, so the route table they observe is final.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;

use crate::mux::Mux;

/// Options controlling a single handler-extract hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookOptions {
    /// When true, the registry itself skips subsequent invocations once the
    /// hook has run once. When false (the default), the hook runs on every
    /// `Handler()` call and must guard its own idempotence, per spec §4.4.
    pub once: bool,
}

struct ExtractHook {
    options: HookOptions,
    called: AtomicBool,
    f: Mutex<Box<dyn FnMut(&mut Mux) + Send>>,
}

struct StartupHook {
    f: Mutex<Box<dyn FnMut(&Mux) + Send>>,
}

/// Shared hook/aggregation registry. One instance per `Server`.
#[derive(Default)]
pub struct HookRegistry {
    aggregators: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
    extract_hooks: Mutex<Vec<ExtractHook>>,
    startup_hooks: Mutex<Vec<StartupHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to the aggregation bucket for type `T`.
    pub fn push<T: Send + Sync + 'static>(&self, value: T) {
        let entry = self
            .aggregators
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Mutex::new(Vec::<T>::new())));
        let bucket = entry
            .downcast_ref::<Mutex<Vec<T>>>()
            .expect("hook aggregator type mismatch");
        bucket.lock().expect("hook aggregator poisoned").push(value);
    }

    /// Take every value pushed for type `T` so far, leaving the bucket
    /// empty.
    pub fn drain<T: Send + Sync + 'static>(&self) -> Vec<T> {
        match self.aggregators.get(&TypeId::of::<T>()) {
            Some(entry) => {
                let bucket = entry
                    .downcast_ref::<Mutex<Vec<T>>>()
                    .expect("hook aggregator type mismatch");
                std::mem::take(&mut *bucket.lock().expect("hook aggregator poisoned"))
            }
            None => Vec::new(),
        }
    }

    /// Clone every value pushed for type `T` so far, leaving the bucket
    /// intact for a later reader (unlike [`HookRegistry::drain`]). For
    /// aggregators more than one subsystem needs to read in full.
    pub fn snapshot<T: Clone + Send + Sync + 'static>(&self) -> Vec<T> {
        match self.aggregators.get(&TypeId::of::<T>()) {
            Some(entry) => {
                let bucket = entry
                    .downcast_ref::<Mutex<Vec<T>>>()
                    .expect("hook aggregator type mismatch");
                bucket.lock().expect("hook aggregator poisoned").clone()
            }
            None => Vec::new(),
        }
    }

    /// Register a callback run against the root `Mux` at handler extraction.
    pub fn on_handler_extract(
        &self,
        options: HookOptions,
        f: impl FnMut(&mut Mux) + Send + 'static,
    ) {
        self.extract_hooks.lock().expect("hook list poisoned").push(ExtractHook {
            options,
            called: AtomicBool::new(false),
            f: Mutex::new(Box::new(f)),
        });
    }

    /// Run every registered handler-extract hook against `mux`, in
    /// registration order, skipping any `once` hook that already ran.
    pub(crate) fn run_extract_hooks(&self, mux: &mut Mux) {
        for hook in self.extract_hooks.lock().expect("hook list poisoned").iter() {
            if hook.options.once && hook.called.load(Ordering::Acquire) {
                continue;
            }
            (hook.f.lock().expect("hook closure poisoned"))(mux);
            hook.called.store(true, Ordering::Release);
        }
    }

    /// Register a callback run against the root `Mux` once, before
    /// `Server::serve_context` starts accepting connections.
    pub fn on_startup(&self, f: impl FnMut(&Mux) + Send + 'static) {
        self.startup_hooks
            .lock()
            .expect("hook list poisoned")
            .push(StartupHook { f: Mutex::new(Box::new(f)) });
    }

    /// Run every registered startup hook against `mux`, in registration
    /// order.
    pub(crate) fn run_startup_hooks(&self, mux: &Mux) {
        for hook in self.startup_hooks.lock().expect("hook list poisoned").iter() {
            (hook.f.lock().expect("hook closure poisoned"))(mux);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn push_and_drain_round_trip() {
        let registry = HookRegistry::new();
        registry.push::<String>("a".to_string());
        registry.push::<String>("b".to_string());
        let drained = registry.drain::<String>();
        assert_eq!(drained, vec!["a".to_string(), "b".to_string()]);
        assert!(registry.drain::<String>().is_empty());
    }

    #[test]
    fn distinct_types_do_not_collide() {
        let registry = HookRegistry::new();
        registry.push::<u32>(1);
        registry.push::<String>("x".into());
        assert_eq!(registry.drain::<u32>(), vec![1]);
        assert_eq!(registry.drain::<String>(), vec!["x".to_string()]);
    }

    #[test]
    fn once_hook_runs_a_single_time() {
        let registry = HookRegistry::new();
        let calls = Arc::new(StdMutex::new(0));
        let calls_clone = calls.clone();
        registry.on_handler_extract(HookOptions { once: true }, move |_mux| {
            *calls_clone.lock().unwrap() += 1;
        });
        let mut mux = Mux::new(Default::default());
        registry.run_extract_hooks(&mut mux);
        registry.run_extract_hooks(&mut mux);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn snapshot_does_not_drain_the_bucket() {
        let registry = HookRegistry::new();
        registry.push::<String>("a".to_string());
        registry.push::<String>("b".to_string());
        assert_eq!(registry.snapshot::<String>(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.snapshot::<String>(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.drain::<String>(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.snapshot::<String>().is_empty());
    }

    #[test]
    fn startup_hooks_run_in_registration_order() {
        let registry = HookRegistry::new();
        let order = Arc::new(StdMutex::new(Vec::new()));
        let first = order.clone();
        let second = order.clone();
        registry.on_startup(move |_mux| first.lock().unwrap().push(1));
        registry.on_startup(move |_mux| second.lock().unwrap().push(2));
        let mux = Mux::new(Default::default());
        registry.run_startup_hooks(&mux);
        registry.run_startup_hooks(&mux);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn non_once_hook_runs_every_call() {
        let registry = HookRegistry::new();
        let calls = Arc::new(StdMutex::new(0));
        let calls_clone = calls.clone();
        registry.on_handler_extract(HookOptions::default(), move |_mux| {
            *calls_clone.lock().unwrap() += 1;
        });
        let mut mux = Mux::new(Default::default());
        registry.run_extract_hooks(&mut mux);
        registry.run_extract_hooks(&mut mux);
        assert_eq!(*calls.lock().unwrap(), 2);
    }
}
