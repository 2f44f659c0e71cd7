//! Messages delivered to the page context and the loop that consumes them.

use crate::controller::{Controller, OverlayDom, UiEvent};
use crate::store::{KeyValueStore, Timer};
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use log::debug;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Keyboard shortcuts forwarded by the extension's command dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyCommand {
    MoveUp,
    MoveDown,
    ResizeTaller,
    ResizeShorter,
    /// Any command this build does not know about.
    #[serde(other)]
    Unknown,
}

/// Wire format of messages sent from the background context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Message {
    Toggle,
    KeyboardCommand { command: KeyCommand },
}

/// Everything the controller reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Host(Message),
    Ui(UiEvent),
}

/// Feed every queued item to the controller, one at a time.
///
/// Items that arrive before initialization wait in the channel and are handled
/// in order once the controller is ready.
pub async fn dispatch<K, T, D>(controller: Rc<Controller<K, T, D>>, mut inbox: UnboundedReceiver<Inbound>)
where
    K: KeyValueStore + 'static,
    T: Timer + 'static,
    D: OverlayDom + 'static,
{
    while let Some(item) = inbox.next().await {
        controller.handle(item).await;
    }
    debug!("Focus Reader: inbox closed");
}
