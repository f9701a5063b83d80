//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire one sender and three receivers on the default bus.
//! - Print every delivery so a local run shows routing at a glance.

use log::error;
use manatee_core::{
    default_log_level, init_logging, ArgType, Args, DispatchSystem, HandlerDecl, LogTarget,
    MessageDecl, MessageReceiver, MessageSender,
};
use std::sync::Arc;

const MESSAGE_A: &str = "A";
const MESSAGE_B: &str = "B";
const MESSAGE_AB: &str = "AB";

struct Sender;

impl MessageSender for Sender {
    fn messages() -> Vec<MessageDecl> {
        vec![
            MessageDecl::unit(MESSAGE_A),
            MessageDecl::unit(MESSAGE_B),
            MessageDecl::new(MESSAGE_AB, [ArgType::of::<String>(), ArgType::of::<i32>()]),
        ]
    }
}

struct ReceiverA;

impl MessageReceiver for ReceiverA {
    fn handlers() -> Vec<HandlerDecl<Self>> {
        vec![HandlerDecl::method("message_a", [], |_: &Self, _| {
            println!("ReceiverA got {MESSAGE_A}");
            Ok(())
        })
        .receives::<Sender>(MESSAGE_A)]
    }
}

struct ReceiverB;

impl MessageReceiver for ReceiverB {
    fn handlers() -> Vec<HandlerDecl<Self>> {
        vec![
            HandlerDecl::method("message_b", [], |_: &Self, _| {
                println!("ReceiverB got {MESSAGE_B}");
                Ok(())
            })
            .receives::<Sender>(MESSAGE_B),
            HandlerDecl::method(
                "message_ab",
                [ArgType::of::<String>(), ArgType::of::<i32>()],
                |_: &Self, args| {
                    let text = args.get::<String>(0)?;
                    let number = args.get::<i32>(1)?;
                    println!("ReceiverB got {MESSAGE_AB} text={text} number={number}");
                    Ok(())
                },
            )
            .receives::<Sender>(MESSAGE_AB),
        ]
    }
}

struct ReceiverAll;

impl MessageReceiver for ReceiverAll {
    fn handlers() -> Vec<HandlerDecl<Self>> {
        vec![HandlerDecl::catchall("everything", |_: &Self, message, args| {
            println!("ReceiverAll got {message} args={}", args.len());
            Ok(())
        })
        .of::<Sender>()]
    }
}

fn main() {
    if let Err(err) = init_logging(default_log_level(), LogTarget::Stderr) {
        eprintln!("manatee logging disabled: {err}");
    }
    println!("manatee_core version={}", manatee_core::core_version());

    let bus = DispatchSystem::default_instance();
    bus.register_sender_type::<Sender>();

    let a = Arc::new(ReceiverA);
    let b = Arc::new(ReceiverB);
    let all = Arc::new(ReceiverAll);
    bus.add_receiver(&a);
    bus.add_receiver(&b);
    bus.add_receiver(&all);

    let emissions = [
        (MESSAGE_A, Args::new()),
        (MESSAGE_B, Args::new()),
        (
            MESSAGE_AB,
            Args::new().with("First Param".to_string()).with(28_i32),
        ),
    ];
    for (message, args) in emissions {
        let delivered = bus.emit(&Sender, message, args);
        println!("emitted {message} delivered={delivered}");
        if delivered == 0 {
            error!("event=demo_emit module=cli status=undelivered message={message}");
        }
    }
}
