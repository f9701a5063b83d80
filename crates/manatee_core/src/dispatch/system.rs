//! Dispatch system: registration and emission.
//!
//! # Responsibility
//! - Register sender types (building their contract registries) and receiver
//!   types (binding their handlers) once per type.
//! - Track receiver instances without owning them.
//! - Emit messages to every live, subscribed receiver.
//!
//! # Invariants
//! - Type registration is idempotent and cumulative; there is no unregister.
//! - Emission resolves the nearest type in the sender's lineage whose
//!   registry catalogs the message; farther declarations are shadowed.
//! - Each receiver gets at most one invocation per emission; a specific
//!   binding wins over the catchall.
//! - No lock is held while handlers run; a failing handler never stops
//!   delivery to the others and never surfaces to the emitter.

use crate::contract::registry::ContractRegistry;
use crate::model::handler::{Args, BindingTarget, HandlerBinding};
use crate::model::receiver::MessageReceiver;
use crate::model::sender::{MessageSender, SenderType};
use crate::model::types::TypeKey;
use crate::util::weak_list::WeakList;
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name of the instance returned by `DispatchSystem::default_instance`.
pub const DEFAULT_SYSTEM_NAME: &str = "<<default>>";

static SYSTEMS: Lazy<Mutex<BTreeMap<String, Arc<DispatchSystem>>>> =
    Lazy::new(|| Mutex::new(BTreeMap::new()));

type Receiver = dyn Any + Send + Sync;

#[derive(Default)]
struct DispatchState {
    senders: BTreeSet<TypeId>,
    receivers: BTreeSet<TypeId>,
    contracts: BTreeMap<TypeId, Arc<ContractRegistry>>,
}

impl DispatchState {
    /// Registry of `sender`, created from its declarations when absent.
    fn contract(&mut self, sender: SenderType) -> &mut Arc<ContractRegistry> {
        self.contracts
            .entry(sender.key().id())
            .or_insert_with(|| Arc::new(ContractRegistry::for_sender(sender)))
    }

    /// Writable registry of `sender`; copies it if an emission still holds it.
    fn contract_mut(&mut self, sender: SenderType) -> &mut ContractRegistry {
        Arc::make_mut(self.contract(sender))
    }

    fn register_sender(&mut self, sender: SenderType) -> bool {
        if self.senders.contains(&sender.key().id()) {
            return false;
        }
        self.contract(sender);
        self.senders.insert(sender.key().id());
        true
    }
}

/// Message bus instance.
pub struct DispatchSystem {
    name: String,
    enabled: AtomicBool,
    state: RwLock<DispatchState>,
    receivers: WeakList<Receiver>,
}

impl DispatchSystem {
    /// Creates an independent, enabled instance not listed in the named table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            state: RwLock::new(DispatchState::default()),
            receivers: WeakList::new(),
        }
    }

    /// Returns the process-wide instance called `name`, creating it on first use.
    pub fn get(name: &str) -> Arc<Self> {
        let mut systems = SYSTEMS.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(system) = systems.get(name) {
            return Arc::clone(system);
        }
        let system = Arc::new(Self::new(name));
        systems.insert(name.to_string(), Arc::clone(&system));
        debug!("event=system_created module=dispatch status=ok system={name}");
        system
    }

    pub fn default_instance() -> Arc<Self> {
        Self::get(DEFAULT_SYSTEM_NAME)
    }

    /// Instance named after type `T`.
    pub fn for_type<T: ?Sized + 'static>() -> Arc<Self> {
        Self::get(type_name::<T>())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kill-switch: while disabled, `emit` delivers nothing.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn register_sender_type<S: MessageSender>(&self) {
        self.register_sender(SenderType::of::<S>());
    }

    pub fn register_sender(&self, sender: SenderType) {
        if self.write_state().register_sender(sender) {
            debug!(
                "event=register_sender module=dispatch status=ok system={} sender={}",
                self.name,
                sender.key()
            );
        }
    }

    pub fn is_sender_registered(&self, sender: SenderType) -> bool {
        self.read_state().senders.contains(&sender.key().id())
    }

    /// Binds every handler `R` declares; later calls for `R` are no-ops.
    pub fn register_receiver_type<R: MessageReceiver>(&self) {
        let receiver = TypeKey::of::<R>();
        if self.read_state().receivers.contains(&receiver.id()) {
            return;
        }
        let bindings: Vec<HandlerBinding> = R::handlers()
            .into_iter()
            .flat_map(|decl| decl.into_bindings())
            .collect();

        let mut state = self.write_state();
        if !state.receivers.insert(receiver.id()) {
            return;
        }
        let total = bindings.len();
        let mut bound = 0;
        for binding in bindings {
            if bind_declared(&mut state, binding) {
                bound += 1;
            }
        }

        debug!(
            "event=register_receiver module=dispatch status=ok system={} receiver={} bound={} rejected={}",
            self.name,
            receiver,
            bound,
            total - bound
        );
    }

    pub fn is_receiver_registered<R: MessageReceiver>(&self) -> bool {
        self.read_state().receivers.contains(&TypeId::of::<R>())
    }

    /// Registers `R` if needed and starts delivering to `instance`.
    ///
    /// The bus keeps only a weak handle; dropping the last `Arc` elsewhere
    /// ends delivery without calling `remove_receiver`.
    pub fn add_receiver<R: MessageReceiver>(&self, instance: &Arc<R>) {
        self.register_receiver_type::<R>();
        let erased: Arc<Receiver> = Arc::clone(instance) as Arc<Receiver>;
        self.receivers.add(&erased);
    }

    /// Stops delivering to `instance`; returns whether it was tracked.
    pub fn remove_receiver<R: MessageReceiver>(&self, instance: &Arc<R>) -> bool {
        let erased: Arc<Receiver> = Arc::clone(instance) as Arc<Receiver>;
        self.receivers.remove(&erased)
    }

    /// Number of live receiver instances.
    pub fn receiver_count(&self) -> usize {
        self.receivers.len()
    }

    /// Registry of `sender`, created from its declarations when absent.
    ///
    /// The returned `Arc` is a consistent view; later registrations do not
    /// show up in it.
    pub fn contract_registry(&self, sender: SenderType) -> Arc<ContractRegistry> {
        if let Some(existing) = self.read_state().contracts.get(&sender.key().id()) {
            return Arc::clone(existing);
        }
        Arc::clone(self.write_state().contract(sender))
    }

    /// Emits `message` on behalf of `sender`.
    ///
    /// Returns how many receivers handled it successfully.
    pub fn emit<S: MessageSender>(&self, _sender: &S, message: &str, args: Args) -> usize {
        self.emit_from(SenderType::of::<S>(), message, &args)
    }

    /// Emits `message` as sender type `sender`.
    pub fn emit_from(&self, sender: SenderType, message: &str, args: &Args) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let Some(contract) = self.resolve_contract(sender, message) else {
            debug!(
                "event=emit module=dispatch status=dropped system={} sender={} message={}",
                self.name,
                sender.key(),
                message
            );
            return 0;
        };

        let mut delivered = 0;
        for receiver in self.receivers.iter() {
            let Some(binding) = contract.resolve(message, (*receiver).type_id()) else {
                continue;
            };
            match binding.invoke(&*receiver, message, args) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(
                    "event=deliver module=dispatch status=failed system={} sender={} message={} receiver={} handler={} error={}",
                    self.name,
                    contract.sender().key(),
                    message,
                    binding.receiver(),
                    binding.name(),
                    err
                ),
            }
        }
        delivered
    }

    /// Nearest registry in the lineage of `sender` that catalogs `message`.
    fn resolve_contract(&self, sender: SenderType, message: &str) -> Option<Arc<ContractRegistry>> {
        let state = self.read_state();
        sender.lineage().into_iter().find_map(|current| {
            state
                .contracts
                .get(&current.key().id())
                .filter(|contract| contract.handles(message))
                .map(Arc::clone)
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, DispatchState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DispatchState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Routes one declared binding into its sender's registry.
fn bind_declared(state: &mut DispatchState, binding: HandlerBinding) -> bool {
    let sender = binding.sender();
    match binding.target() {
        BindingTarget::Catchall => {
            state.register_sender(sender);
            state.contract_mut(sender).bind_catchall(binding);
            true
        }
        BindingTarget::Message(_) => state.contract_mut(sender).bind_handler(binding),
    }
}

impl Debug for DispatchSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("DispatchSystem")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("senders", &state.senders.len())
            .field("receiver_types", &state.receivers.len())
            .field("contracts", &state.contracts.len())
            .field("receivers", &self.receivers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchSystem, DEFAULT_SYSTEM_NAME};
    use crate::model::handler::Args;
    use crate::model::message::MessageDecl;
    use crate::model::receiver::{HandlerDecl, MessageReceiver};
    use crate::model::sender::{MessageSender, SenderType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct Ticker;

    impl MessageSender for Ticker {
        fn messages() -> Vec<MessageDecl> {
            vec![MessageDecl::unit("tick")]
        }
    }

    #[derive(Default)]
    struct Counter {
        ticks: AtomicUsize,
    }

    impl MessageReceiver for Counter {
        fn handlers() -> Vec<HandlerDecl<Self>> {
            vec![HandlerDecl::method("on_tick", [], |counter: &Self, _| {
                counter.ticks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .receives::<Ticker>("tick")]
        }
    }

    #[test]
    fn named_lookup_returns_one_instance_under_contention() {
        let name = "dispatch-system-tests-contention";
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(move || DispatchSystem::get(name)))
            .collect();
        let systems: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("lookup thread"))
            .collect();
        assert!(systems
            .windows(2)
            .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(systems[0].name(), name);
    }

    #[test]
    fn default_and_typed_instances_are_named() {
        assert_eq!(DispatchSystem::default_instance().name(), DEFAULT_SYSTEM_NAME);
        let typed = DispatchSystem::for_type::<Ticker>();
        assert!(typed.name().ends_with("Ticker"));
        assert!(Arc::ptr_eq(&typed, &DispatchSystem::for_type::<Ticker>()));
    }

    #[test]
    fn registration_is_idempotent() {
        let system = DispatchSystem::new("idempotent");
        system.register_sender_type::<Ticker>();
        system.register_sender_type::<Ticker>();
        system.register_receiver_type::<Counter>();
        system.register_receiver_type::<Counter>();

        assert!(system.is_sender_registered(SenderType::of::<Ticker>()));
        assert!(system.is_receiver_registered::<Counter>());
        let contract = system.contract_registry(SenderType::of::<Ticker>());
        assert_eq!(contract.binding_count(), 1);
    }

    #[test]
    fn contract_snapshot_held_by_caller_is_stable() {
        let system = DispatchSystem::new("snapshot");
        let before = system.contract_registry(SenderType::of::<Ticker>());
        assert!(!system.is_sender_registered(SenderType::of::<Ticker>()));
        system.register_receiver_type::<Counter>();

        assert_eq!(before.binding_count(), 0);
        let after = system.contract_registry(SenderType::of::<Ticker>());
        assert_eq!(after.binding_count(), 1);
    }

    #[test]
    fn emission_counts_successful_deliveries() {
        let system = DispatchSystem::new("counting");
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        system.add_receiver(&first);
        system.add_receiver(&second);

        assert_eq!(system.emit(&Ticker, "tick", Args::new()), 2);
        assert_eq!(first.ticks.load(Ordering::SeqCst), 1);

        assert!(system.remove_receiver(&second));
        assert_eq!(system.emit(&Ticker, "tick", Args::new()), 1);
        assert_eq!(second.ticks.load(Ordering::SeqCst), 1);
        assert!(format!("{system:?}").contains("name: \"counting\""));
    }
}
