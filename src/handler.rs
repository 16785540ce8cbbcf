//! Handler registration and lookup
//!
//! Handlers are plain functions or closures taking the transport and the
//! event, optionally followed by the arguments bound at registration:
//!
//! ```rust
//! use rtm_dispatch::{BoundArgs, Event, HandlerRegistry, HandlerResult};
//! use rtm_dispatch::testing::MockTransport;
//! use rtm_dispatch::transport::Transport;
//!
//! fn echo(transport: &MockTransport, event: &Event) -> HandlerResult {
//!     if let (Some(channel), Some(text)) = (event.get_str("channel"), event.get_str("text")) {
//!         transport.send(channel, text)?;
//!     }
//!     Ok(())
//! }
//!
//! fn greet(transport: &MockTransport, event: &Event, args: &BoundArgs) -> HandlerResult {
//!     let greeting = args.get("greeting").and_then(|v| v.as_str()).unwrap_or("hi");
//!     transport.send(event.get_str("channel").unwrap_or_default(), greeting)?;
//!     Ok(())
//! }
//!
//! let mut registry = HandlerRegistry::<MockTransport>::new();
//! registry.on("message", echo).unwrap();
//! registry.register("hello", greet, Some(serde_json::json!({"greeting": "hey"})
//!     .as_object().cloned().unwrap_or_default())).unwrap();
//! assert_eq!(registry.len(), 2);
//! ```
//!
//! Callables declaring fewer than two parameters are rejected at registration
//! with a [`ConfigurationError::InvalidHandler`].

use crate::error::{ConfigurationError, HandlerResult};
use crate::event::{BoundArgs, Event};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Event type matching every event
pub const WILDCARD: &str = "*";

/// Parameters every handler must accept, in order
pub const REQUIRED_PARAMETERS: [&str; 2] = ["transport", "event"];

/// Type-erased callback stored in the registry
pub type Callback<T> = Arc<dyn Fn(&T, &Event, &BoundArgs) -> HandlerResult + Send + Sync>;

/// Marker types selecting an [`IntoHandler`] implementation by arity
pub mod marker {
    pub struct NoParameters;
    pub struct TransportOnly;
    pub struct TransportAndEvent;
    pub struct WithArgs;
}

/// Conversion of a callable into a registry callback
///
/// Implemented for `Fn()`, `Fn(&T)`, `Fn(&T, &Event)` and
/// `Fn(&T, &Event, &BoundArgs)`, each returning [`HandlerResult`]. Only the
/// last two yield a callback; the others exist so that registering them is a
/// reportable configuration error instead of an opaque trait error.
pub trait IntoHandler<T, Marker> {
    /// Parameter names the callable declares
    const PARAMETERS: &'static [&'static str];

    fn into_callback(self) -> Option<Callback<T>>;
}

impl<T, F> IntoHandler<T, marker::NoParameters> for F
where
    F: Fn() -> HandlerResult + Send + Sync + 'static,
{
    const PARAMETERS: &'static [&'static str] = &[];

    fn into_callback(self) -> Option<Callback<T>> {
        None
    }
}

impl<T, F> IntoHandler<T, marker::TransportOnly> for F
where
    F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
{
    const PARAMETERS: &'static [&'static str] = &["transport"];

    fn into_callback(self) -> Option<Callback<T>> {
        None
    }
}

impl<T, F> IntoHandler<T, marker::TransportAndEvent> for F
where
    F: Fn(&T, &Event) -> HandlerResult + Send + Sync + 'static,
{
    const PARAMETERS: &'static [&'static str] = &["transport", "event"];

    fn into_callback(self) -> Option<Callback<T>> {
        Some(Arc::new(move |transport: &T, event: &Event, _args: &BoundArgs| {
            self(transport, event)
        }))
    }
}

impl<T, F> IntoHandler<T, marker::WithArgs> for F
where
    F: Fn(&T, &Event, &BoundArgs) -> HandlerResult + Send + Sync + 'static,
{
    const PARAMETERS: &'static [&'static str] = &["transport", "event", "args"];

    fn into_callback(self) -> Option<Callback<T>> {
        Some(Arc::new(self))
    }
}

/// One registered handler
pub struct Registration<T> {
    event_type: String,
    name: String,
    callback: Callback<T>,
    args: BoundArgs,
}

impl<T> Registration<T> {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Name of the registered callable, for logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &BoundArgs {
        &self.args
    }

    /// Call the handler with its bound arguments
    pub fn invoke(&self, transport: &T, event: &Event) -> HandlerResult {
        (self.callback)(transport, event, &self.args)
    }
}

impl<T> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            event_type: self.event_type.clone(),
            name: self.name.clone(),
            callback: Arc::clone(&self.callback),
            args: self.args.clone(),
        }
    }
}

impl<T> fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("event_type", &self.event_type)
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Mapping from event type to the handlers registered for it
///
/// Registration order is preserved per type. Lookup returns type-specific
/// handlers first, then wildcard handlers.
pub struct HandlerRegistry<T> {
    handlers: HashMap<String, Vec<Registration<T>>>,
}

impl<T> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Validate and append a handler for `event_type`
    ///
    /// The handler is consumed. Function items are `Copy` and stay callable
    /// after registration; clone a closure first to keep using it directly.
    /// Non-empty `args` require a handler taking `&BoundArgs`.
    pub fn register<F, M>(
        &mut self,
        event_type: impl Into<String>,
        handler: F,
        args: Option<BoundArgs>,
    ) -> Result<(), ConfigurationError>
    where
        F: IntoHandler<T, M>,
    {
        self.register_named(event_type, short_type_name::<F>(), handler, args)
    }

    /// Same as [`register`](Self::register) with an explicit name for logs and errors
    pub fn register_named<F, M>(
        &mut self,
        event_type: impl Into<String>,
        name: impl Into<String>,
        handler: F,
        args: Option<BoundArgs>,
    ) -> Result<(), ConfigurationError>
    where
        F: IntoHandler<T, M>,
    {
        let name = name.into();
        let declared = <F as IntoHandler<T, M>>::PARAMETERS;
        let callback = handler.into_callback().ok_or_else(|| {
            ConfigurationError::InvalidHandler {
                signature: format!("{name}({})", declared.join(", ")),
                missing: REQUIRED_PARAMETERS[declared.len().min(2)..].to_vec(),
            }
        })?;

        let args = args.unwrap_or_default();
        if !args.is_empty() && declared.len() <= REQUIRED_PARAMETERS.len() {
            return Err(ConfigurationError::UnacceptedArgs {
                handler: name,
                args: args.keys().cloned().collect(),
            });
        }

        let event_type = event_type.into();
        self.handlers
            .entry(event_type.clone())
            .or_default()
            .push(Registration {
                event_type,
                name,
                callback,
                args,
            });
        Ok(())
    }

    /// Register without bound arguments
    pub fn on<F, M>(
        &mut self,
        event_type: impl Into<String>,
        handler: F,
    ) -> Result<(), ConfigurationError>
    where
        F: IntoHandler<T, M>,
    {
        self.register(event_type, handler, None)
    }

    /// Handlers to run for `event_type`: specific ones, then wildcard ones
    pub fn lookup(&self, event_type: &str) -> Vec<&Registration<T>> {
        let specific = self.handlers.get(event_type).into_iter().flatten();
        let wildcard = if event_type == WILDCARD {
            None
        } else {
            self.handlers.get(WILDCARD)
        };
        specific.chain(wildcard.into_iter().flatten()).collect()
    }

    /// Handlers to run for `event`; a non-string `type` matches wildcard handlers only
    pub fn lookup_event(&self, event: &Event) -> Vec<&Registration<T>> {
        match event.event_type() {
            Some(event_type) => self.lookup(event_type),
            None => self.handlers.get(WILDCARD).into_iter().flatten().collect(),
        }
    }

    /// Total number of registrations
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }

    /// Event types with at least one registration, sorted
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandlerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.event_types())
            .field("len", &self.len())
            .finish()
    }
}

/// Fallback name for callables whose type says nothing about them
const ANONYMOUS_HANDLER: &str = "handler";

/// Last path segment of a type name, e.g. `echo` for `my_bot::handlers::echo`
///
/// Function pointers, references and boxed or shared callables are named
/// `handler`; use `register_named` to give them a real name.
fn short_type_name<F>() -> String {
    let full = std::any::type_name::<F>();
    if full.starts_with("fn(")
        || full.starts_with("for<")
        || full.starts_with('&')
        || full.starts_with("dyn ")
        || full.starts_with("unsafe ")
        || full.starts_with("extern ")
    {
        return ANONYMOUS_HANDLER.to_string();
    }

    let without_generics = full.split('<').next().unwrap_or(full);
    let segment = without_generics
        .rsplit("::")
        .find(|segment| !segment.is_empty() && *segment != "{{closure}}")
        .unwrap_or(without_generics);
    match segment {
        "Box" | "Arc" | "Rc" => ANONYMOUS_HANDLER.to_string(),
        _ => segment.to_string(),
    }
}
