//! Named-channel publish/subscribe registry.
//!
//! Channels are opened lazily: subscribing to or emitting on a channel that has
//! never been seen is legal and simply starts with zero listeners.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

/// An event channel. The five provider channels are fixed; any other name is
/// carried in [`Channel::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Subscription pushes (`*_subscription`).
    Notification,
    Connect,
    Close,
    ChainChanged,
    AccountsChanged,
    Other(String),
}

impl Channel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Notification => "notification",
            Self::Connect => "connect",
            Self::Close => "close",
            Self::ChainChanged => "chainChanged",
            Self::AccountsChanged => "accountsChanged",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        match name {
            "notification" => Self::Notification,
            "connect" => Self::Connect,
            "close" => Self::Close,
            "chainChanged" => Self::ChainChanged,
            "accountsChanged" => Self::AccountsChanged,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// `params` of a subscription push, unmodified.
    Notification(Value),
    Connect,
    Close { code: u16, reason: String },
    ChainChanged(String),
    AccountsChanged(Vec<String>),
    /// Caller-defined event on an arbitrary channel.
    Custom { channel: String, args: Vec<Value> },
}

impl ProviderEvent {
    /// Build an event for `channel` from positional JSON arguments.
    pub fn custom(channel: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Custom {
            channel: channel.into(),
            args,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::Notification(_) => Channel::Notification,
            Self::Connect => Channel::Connect,
            Self::Close { .. } => Channel::Close,
            Self::ChainChanged(_) => Channel::ChainChanged,
            Self::AccountsChanged(_) => Channel::AccountsChanged,
            Self::Custom { channel, .. } => Channel::from(channel.as_str()),
        }
    }

    /// Positional arguments as they would appear on the wire.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::Notification(params) => vec![params.clone()],
            Self::Connect => vec![],
            Self::Close { code, reason } => vec![json!(code), json!(reason)],
            Self::ChainChanged(chain_id) => vec![json!(chain_id)],
            Self::AccountsChanged(accounts) => vec![json!(accounts)],
            Self::Custom { args, .. } => args.clone(),
        }
    }
}

/// A registered callback. Identity (for removal) is the `Arc` allocation.
pub type Listener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&ProviderEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Returned by [`EventBus::on`]; pass to [`EventBus::off`] to unregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    channel: Channel,
    id: u64,
}

impl ListenerHandle {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

struct Registration {
    id: u64,
    listener: Listener,
    once: bool,
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Channel name → ordered listener list.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    channels: Mutex<HashMap<Channel, Vec<Registration>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to `channel`. The same listener may be registered
    /// more than once; it is then invoked once per registration.
    pub fn on(&self, channel: impl Into<Channel>, listener: Listener) -> ListenerHandle {
        self.register(channel.into(), listener, false)
    }

    /// Like [`on`](Self::on), but the registration is dropped before its first
    /// invocation.
    pub fn once(&self, channel: impl Into<Channel>, listener: Listener) -> ListenerHandle {
        self.register(channel.into(), listener, true)
    }

    fn register(&self, channel: Channel, listener: Listener, once: bool) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels
            .lock()
            .unwrap()
            .entry(channel.clone())
            .or_default()
            .push(Registration { id, listener, once });
        ListenerHandle { channel, id }
    }

    /// Remove the first registration of `listener` on `channel`. No-op if absent.
    pub fn remove_listener(&self, channel: impl Into<Channel>, listener: &Listener) -> bool {
        let channel = channel.into();
        let mut channels = self.channels.lock().unwrap();
        let Some(regs) = channels.get_mut(&channel) else {
            return false;
        };
        match regs.iter().position(|r| same_listener(&r.listener, listener)) {
            Some(pos) => {
                regs.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove the registration behind `handle`.
    pub fn off(&self, handle: &ListenerHandle) -> bool {
        self.take(&handle.channel, handle.id)
    }

    /// Remove every listener on `channel`; returns how many were removed.
    pub fn remove_all_listeners(&self, channel: impl Into<Channel>) -> usize {
        self.channels
            .lock()
            .unwrap()
            .remove(&channel.into())
            .map_or(0, |regs| regs.len())
    }

    pub fn listener_count(&self, channel: impl Into<Channel>) -> usize {
        self.channels
            .lock()
            .unwrap()
            .get(&channel.into())
            .map_or(0, Vec::len)
    }

    fn take(&self, channel: &Channel, id: u64) -> bool {
        let mut channels = self.channels.lock().unwrap();
        let Some(regs) = channels.get_mut(channel) else {
            return false;
        };
        match regs.iter().position(|r| r.id == id) {
            Some(pos) => {
                regs.remove(pos);
                true
            }
            None => false,
        }
    }

    fn is_registered(&self, channel: &Channel, id: u64) -> bool {
        self.channels
            .lock()
            .unwrap()
            .get(channel)
            .is_some_and(|regs| regs.iter().any(|r| r.id == id))
    }

    /// Invoke every listener on the event's channel, in registration order.
    ///
    /// The registry lock is not held while listeners run, so a listener may
    /// add or remove listeners. A registration removed mid-emission is skipped.
    /// A panicking listener is logged and skipped; the rest still run.
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &ProviderEvent) -> usize {
        let channel = event.channel();
        let snapshot: Vec<(u64, Listener, bool)> = match self.channels.lock().unwrap().get(&channel) {
            Some(regs) => regs
                .iter()
                .map(|r| (r.id, Arc::clone(&r.listener), r.once))
                .collect(),
            None => return 0,
        };

        let mut invoked = 0;
        for (id, listener, once) in snapshot {
            let live = if once {
                self.take(&channel, id)
            } else {
                self.is_registered(&channel, id)
            };
            if !live {
                continue;
            }
            invoked += 1;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                tracing::warn!(channel = %channel, listener = id, error = %msg, "event listener panicked");
            }
        }
        invoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn recorder() -> (Listener, Arc<Mutex<Vec<ProviderEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let l = listener(move |e| sink.lock().unwrap().push(e.clone()));
        (l, seen)
    }

    #[test]
    fn channel_names_round_trip() {
        for name in ["notification", "connect", "close", "chainChanged", "accountsChanged"] {
            assert_eq!(Channel::from(name).as_str(), name);
        }
        assert_eq!(Channel::from("message"), Channel::Other("message".into()));
    }

    #[test]
    fn emit_on_unknown_channel_is_legal() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(&ProviderEvent::custom("nobody", vec![])), 0);
        assert_eq!(bus.listener_count("nobody"), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.on(Channel::Connect, listener(move |_| order.lock().unwrap().push(tag)));
        }
        assert_eq!(bus.emit(&ProviderEvent::Connect), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicates_fire_per_registration_and_remove_one_at_a_time() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU32::new(0));
        let h = Arc::clone(&hits);
        let l = listener(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        bus.on("connect", Arc::clone(&l));
        bus.on("connect", Arc::clone(&l));
        bus.emit(&ProviderEvent::Connect);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(bus.remove_listener("connect", &l));
        bus.emit(&ProviderEvent::Connect);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        assert!(bus.remove_listener("connect", &l));
        assert!(!bus.remove_listener("connect", &l));
        bus.emit(&ProviderEvent::Connect);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn remove_listener_requires_same_arc() {
        let bus = EventBus::new();
        let (l, _) = recorder();
        let (other, _) = recorder();
        bus.on("close", l);
        assert!(!bus.remove_listener("close", &other));
        assert!(!bus.remove_listener("connect", &other));
        assert_eq!(bus.listener_count("close"), 1);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let (after, seen) = recorder();
        bus.on("chainChanged", listener(|_| panic!("boom")));
        bus.on("chainChanged", after);
        let invoked = bus.emit(&ProviderEvent::ChainChanged("0x5".into()));
        assert_eq!(invoked, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ProviderEvent::ChainChanged("0x5".into())]
        );
    }

    #[test]
    fn listener_removed_from_inside_another_listener_is_not_invoked() {
        let bus = Arc::new(EventBus::new());
        let (victim, seen) = recorder();

        let bus2 = Arc::clone(&bus);
        let victim2 = Arc::clone(&victim);
        bus.on(
            Channel::Notification,
            listener(move |_| {
                bus2.remove_listener(Channel::Notification, &victim2);
            }),
        );
        bus.on(Channel::Notification, victim);

        bus.emit(&ProviderEvent::Notification(json!({"n": 1})));
        bus.emit(&ProviderEvent::Notification(json!({"n": 2})));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn once_fires_a_single_time() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        bus.once("connect", l);
        bus.emit(&ProviderEvent::Connect);
        bus.emit(&ProviderEvent::Connect);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count("connect"), 0);
    }

    #[test]
    fn off_by_handle() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        let handle = bus.on("accountsChanged", l);
        assert_eq!(handle.channel(), &Channel::AccountsChanged);
        assert!(bus.off(&handle));
        assert!(!bus.off(&handle));
        bus.emit(&ProviderEvent::AccountsChanged(vec![]));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn custom_event_routes_by_name() {
        let bus = EventBus::new();
        let (l, seen) = recorder();
        bus.on("message", l);
        bus.emit(&ProviderEvent::custom("message", vec![json!("hi")]));
        assert_eq!(seen.lock().unwrap()[0].args(), vec![json!("hi")]);
        assert_eq!(bus.remove_all_listeners("message"), 1);
    }

    #[test]
    fn close_args_are_code_then_reason() {
        let ev = ProviderEvent::Close {
            code: 1006,
            reason: "abnormal".into(),
        };
        assert_eq!(ev.args(), vec![json!(1006), json!("abnormal")]);
    }
}
