//! Receiver type declarations.
//!
//! # Responsibility
//! - Let a receiver type list its handler callables explicitly.
//! - Expand each callable into one binding per declared target.
//!
//! # Invariants
//! - One callable may serve several (sender, message) targets.
//! - Catchall targets require a catchall callable; others are skipped.

use crate::model::handler::{Args, BindingTarget, Callable, HandlerBinding, HandlerResult, Parameters};
use crate::model::sender::{MessageSender, SenderType};
use crate::model::types::{ArgType, TypeKey};
use log::warn;
use std::any::Any;
use std::marker::PhantomData;

/// A type whose instances receive messages.
pub trait MessageReceiver: Any + Send + Sync + Sized {
    fn handlers() -> Vec<HandlerDecl<Self>>;
}

/// One handler callable of receiver type `R` and the targets it serves.
pub struct HandlerDecl<R> {
    name: String,
    parameters: Parameters,
    callable: Callable,
    targets: Vec<(SenderType, BindingTarget)>,
    _receiver: PhantomData<fn(&R)>,
}

impl<R: Any> HandlerDecl<R> {
    /// Handler taking a fixed, typed parameter list.
    pub fn method<F>(name: impl Into<String>, params: impl IntoIterator<Item = ArgType>, f: F) -> Self
    where
        F: Fn(&R, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self::build(
            name.into(),
            Parameters::Fixed(params.into_iter().collect()),
            Callable::positional::<R, F>(f),
        )
    }

    /// Handler taking any argument list; skips signature validation.
    pub fn variadic<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&R, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self::build(name.into(), Parameters::Variadic, Callable::positional::<R, F>(f))
    }

    /// Handler receiving the message name along with its arguments.
    pub fn catchall<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&R, &str, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self::build(name.into(), Parameters::Variadic, Callable::catchall::<R, F>(f))
    }

    fn build(name: String, parameters: Parameters, callable: Callable) -> Self {
        Self {
            name,
            parameters,
            callable,
            targets: Vec::new(),
            _receiver: PhantomData,
        }
    }

    /// Attaches this callable to `message` of sender type `S`.
    pub fn receives<S: MessageSender>(mut self, message: impl Into<String>) -> Self {
        self.targets.push((
            SenderType::of::<S>(),
            BindingTarget::Message(message.into()),
        ));
        self
    }

    /// Attaches this callable as the catchall for sender type `S`.
    pub fn of<S: MessageSender>(mut self) -> Self {
        self.targets
            .push((SenderType::of::<S>(), BindingTarget::Catchall));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_bindings(self) -> Vec<HandlerBinding> {
        let receiver = TypeKey::of::<R>();
        let mut bindings = Vec::with_capacity(self.targets.len());
        for (sender, target) in self.targets {
            if target == BindingTarget::Catchall && !self.callable.is_catchall() {
                warn!(
                    "event=declare_handler module=model status=skipped receiver={} handler={} sender={} reason=catchall_needs_message_name_parameter",
                    receiver,
                    self.name,
                    sender.key()
                );
                continue;
            }
            bindings.push(HandlerBinding::from_parts(
                receiver,
                sender,
                target,
                self.parameters.clone(),
                self.name.clone(),
                self.callable.clone(),
            ));
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::HandlerDecl;
    use crate::model::handler::BindingTarget;
    use crate::model::message::MessageDecl;
    use crate::model::sender::MessageSender;
    use crate::model::types::ArgType;

    struct Alpha;
    struct Beta;
    struct Listener;

    impl MessageSender for Alpha {
        fn messages() -> Vec<MessageDecl> {
            vec![MessageDecl::unit("ping")]
        }
    }

    impl MessageSender for Beta {
        fn messages() -> Vec<MessageDecl> {
            vec![MessageDecl::unit("pong")]
        }
    }

    #[test]
    fn one_callable_expands_to_every_target() {
        let bindings = HandlerDecl::<Listener>::variadic("record", |_, _| Ok(()))
            .receives::<Alpha>("ping")
            .receives::<Beta>("pong")
            .into_bindings();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].message(), Some("ping"));
        assert_eq!(bindings[1].message(), Some("pong"));
        assert!(bindings.iter().all(|binding| binding.name() == "record"));
        assert!(bindings.iter().all(|binding| binding.parameters().is_variadic()));
    }

    #[test]
    fn catchall_target_needs_catchall_callable() {
        let skipped = HandlerDecl::<Listener>::method("typed", [ArgType::of::<i32>()], |_, _| Ok(()))
            .of::<Alpha>()
            .into_bindings();
        assert!(skipped.is_empty());

        let kept = HandlerDecl::<Listener>::catchall("all", |_, _, _| Ok(()))
            .of::<Alpha>()
            .into_bindings();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].target(), &BindingTarget::Catchall);
    }
}
