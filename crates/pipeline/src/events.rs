//! Stage-transition events.
//!
//! The pipeline core knows nothing about any UI. Callers that want progress
//! reporting attach a channel and receive structured events; emission is
//! fire-and-forget and never blocks a stage.

use crate::types::{AnswerPath, ExtractionMethod, SourceScope};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One pipeline stage transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageEvent {
    ExtractionCompleted {
        method: ExtractionMethod,
        keyword_count: usize,
        confidence: f64,
    },
    SourceJudged {
        primary: SourceScope,
        confidence: f64,
    },
    SearchCompleted {
        total_documents: usize,
        failed_strategies: usize,
        cache_hits: usize,
    },
    Merged {
        unique_documents: usize,
    },
    Scored {
        overall: f64,
    },
    PathSelected {
        path: AnswerPath,
        overall: f64,
    },
    Synthesized {
        degraded: bool,
    },
}

/// Event emitter handle held by the pipeline.
#[derive(Clone)]
pub struct StageEmitter {
    sender: Option<mpsc::UnboundedSender<StageEvent>>,
}

impl StageEmitter {
    /// An emitter that drops every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// An emitter paired with a receiver for the caller.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StageEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// Emit an event. A closed or absent receiver is ignored.
    pub fn emit(&self, event: StageEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_emitter_never_blocks() {
        let emitter = StageEmitter::disabled();
        emitter.emit(StageEvent::Merged {
            unique_documents: 3,
        });
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (emitter, mut rx) = StageEmitter::channel();
        emitter.emit(StageEvent::Scored { overall: 0.5 });
        emitter.emit(StageEvent::Synthesized { degraded: false });

        assert_eq!(rx.recv().await, Some(StageEvent::Scored { overall: 0.5 }));
        assert_eq!(
            rx.recv().await,
            Some(StageEvent::Synthesized { degraded: false })
        );
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (emitter, rx) = StageEmitter::channel();
        drop(rx);
        // Must not panic or block
        emitter.emit(StageEvent::Merged {
            unique_documents: 0,
        });
    }
}
