//! An [`OutboundSink`] that prints to stdout, used when the CLI drives
//! a single task run out-of-process rather than through a live channel.

use async_trait::async_trait;
use nanoclaw_queue::OutboundSink;
use nanoclaw_types::Jid;

pub struct StdoutSink;

#[async_trait]
impl OutboundSink for StdoutSink {
    async fn deliver(&self, jid: &Jid, text: &str) {
        println!("[{jid}] {text}");
    }
}
