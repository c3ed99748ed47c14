use crate::protocol::ConversationAreaModel;

use super::InteractableArea;

/// Area where nearby players share a topic. The topic only lives while
/// someone is inside.
#[derive(Debug, Clone)]
pub struct ConversationArea {
    base: InteractableArea,
    topic: Option<String>,
}

impl ConversationArea {
    pub fn new(base: InteractableArea) -> Self {
        Self { base, topic: None }
    }

    pub fn base(&self) -> &InteractableArea {
        &self.base
    }

    pub(super) fn base_mut(&mut self) -> &mut InteractableArea {
        &mut self.base
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn set_topic(&mut self, topic: String) {
        self.topic = Some(topic);
    }

    pub(super) fn clear_topic(&mut self) {
        self.topic = None;
    }

    pub fn to_model(&self) -> ConversationAreaModel {
        ConversationAreaModel {
            id: self.base.id().clone(),
            occupants: self.base.occupants().to_vec(),
            topic: self.topic.clone(),
        }
    }
}
