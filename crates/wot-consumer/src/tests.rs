use std::sync::Arc;

use serde_json::json;

use tokio::sync::mpsc::Receiver;

use wot_td::ThingDescription;

use crate::config::ConsumerConfig;
use crate::consumer::ThingConsumer;
use crate::message::Message;
use crate::router::{ChannelOutput, Diagnostic};
use crate::runtime::ThingRuntime;

const BUFFER_SIZE: usize = 16;

pub(crate) struct Wired {
    pub(crate) consumer: ThingConsumer,
    pub(crate) messages: Receiver<Message>,
    pub(crate) diagnostics: Receiver<Diagnostic>,
}

pub(crate) async fn wire(runtime: &dyn ThingRuntime, config: ConsumerConfig) -> Wired {
    let (output, messages, diagnostics) = ChannelOutput::new(BUFFER_SIZE);
    let consumer = ThingConsumer::start(runtime, config, Arc::new(output))
        .await
        .unwrap();

    Wired {
        consumer,
        messages,
        diagnostics,
    }
}

// Collects everything already buffered in a channel.
pub(crate) fn drain<T>(receiver: &mut Receiver<T>) -> Vec<T> {
    std::iter::from_fn(|| receiver.try_recv().ok()).collect()
}

pub(crate) fn lamp() -> ThingDescription {
    ThingDescription::from_value(json!({
        "id": "urn:dev:lamp",
        "title": "Lamp",
        "properties": {
            "temperature": { "type": "number", "@type": "Temperature" },
            "brightness": { "type": "integer", "@type": "Level", "default": 100 },
        },
        "actions": {
            "fade": { "input": { "type": "integer", "const": 30 } },
        },
        "events": {
            "overheated": {},
        },
    }))
    .unwrap()
}

pub(crate) fn switches() -> ThingDescription {
    ThingDescription::from_value(json!({
        "title": "Switches",
        "base": "http://switches.local/",
        "properties": {
            "left": { "type": "string", "@type": ["OnOff", "Switch"] },
            "right": { "type": "string", "@type": "OnOff" },
            "uptime": { "type": "integer" },
        },
        "actions": {
            "toggleLeft": { "@type": "Toggle" },
            "toggleRight": { "@type": ["Toggle"] },
            "reset": {},
        },
    }))
    .unwrap()
}
