//! In-memory model of the rendered conversation.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Thinking,
    System,
    Embedded,
}

/// One rendered node in the conversation.
#[derive(Debug, Clone)]
pub struct MessageNode {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
}

impl MessageNode {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
        }
    }
}

/// Append-only view of the conversation, except for the live thinking node.
///
/// At most one thinking node exists at a time: a new thinking chunk replaces
/// the previous one, and any non-thinking content resolves it. Everything
/// else is appended in arrival order and never reordered.
#[derive(Debug, Default)]
pub struct ConversationView {
    nodes: Vec<MessageNode>,
    live_thinking: Option<Uuid>,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[MessageNode] {
        &self.nodes
    }

    pub fn live_thinking(&self) -> Option<&MessageNode> {
        let id = self.live_thinking?;
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> &MessageNode {
        self.push(MessageNode::new(Role::User, text))
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) -> &MessageNode {
        self.resolve_thinking();
        self.push(MessageNode::new(Role::Assistant, text))
    }

    pub fn push_system(&mut self, text: impl Into<String>) -> &MessageNode {
        self.push(MessageNode::new(Role::System, text))
    }

    pub fn push_embedded(&mut self, payload: impl Into<String>) -> &MessageNode {
        self.push(MessageNode::new(Role::Embedded, payload))
    }

    /// Show a thinking update, replacing the previous one if still live.
    pub fn push_thinking(&mut self, text: impl Into<String>) -> &MessageNode {
        self.resolve_thinking();
        let node = MessageNode::new(Role::Thinking, text);
        self.live_thinking = Some(node.id);
        self.push(node)
    }

    /// Remove the live thinking node, if any. Returns the removed node.
    pub fn resolve_thinking(&mut self) -> Option<MessageNode> {
        let id = self.live_thinking.take()?;
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        Some(self.nodes.remove(pos))
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.live_thinking = None;
    }

    fn push(&mut self, node: MessageNode) -> &MessageNode {
        self.nodes.push(node);
        self.nodes.last().expect("just pushed")
    }
}
