//! Branch-capable conversation history.
//!
//! Messages form a tree through `parent_uuid`. The history keeps every message
//! it has ever committed in an immutable node table and, separately, the
//! canonical root-to-tip path of the last successful turn. Earlier branch
//! points stay reachable through [`ConversationHistory::messages_up_to`].

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::core::types::Message;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("unknown message uuid '{uuid}'")]
    UnknownMessage { uuid: String },

    #[error("message '{uuid}' references missing parent '{parent_uuid}'")]
    DanglingParent { uuid: String, parent_uuid: String },

    #[error("duplicate message uuid '{uuid}'")]
    DuplicateMessage { uuid: String },

    #[error("message '{uuid}' already exists with different content")]
    ConflictingMessage { uuid: String },

    #[error("cycle detected while walking ancestors of '{uuid}'")]
    Cycle { uuid: String },
}

/// Immutable node table plus the committed path through it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    nodes: Vec<Message>,
    index: HashMap<String, usize>,
    path: Vec<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history whose committed path is exactly `messages`.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, HistoryError> {
        let mut history = Self::new();
        history.replace(messages)?;
        Ok(history)
    }

    /// Rebuild a history from its persisted parts.
    ///
    /// `nodes` is every known message in commit order, `path` the uuids of the
    /// committed root-to-tip path.
    pub fn from_parts(nodes: Vec<Message>, path: Vec<String>) -> Result<Self, HistoryError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.uuid.clone(), position).is_some() {
                return Err(HistoryError::DuplicateMessage {
                    uuid: node.uuid.clone(),
                });
            }
        }
        for node in &nodes {
            if let Some(parent) = &node.parent_uuid {
                if !index.contains_key(parent) {
                    return Err(HistoryError::DanglingParent {
                        uuid: node.uuid.clone(),
                        parent_uuid: parent.clone(),
                    });
                }
            }
        }
        for uuid in &path {
            if !index.contains_key(uuid) {
                return Err(HistoryError::UnknownMessage { uuid: uuid.clone() });
            }
        }
        Ok(Self { nodes, index, path })
    }

    /// Messages along the committed path, root first.
    pub fn messages(&self) -> Vec<Message> {
        self.path
            .iter()
            .filter_map(|uuid| self.get(uuid).cloned())
            .collect()
    }

    /// Every message ever committed, in commit order.
    pub fn nodes(&self) -> &[Message] {
        &self.nodes
    }

    /// Uuids of the committed path, root first.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.path.last().and_then(|uuid| self.get(uuid))
    }

    pub fn get(&self, uuid: &str) -> Option<&Message> {
        self.index.get(uuid).map(|&position| &self.nodes[position])
    }

    /// Inclusive ancestor walk: the root-first prefix ending at `uuid`.
    ///
    /// Works for any known node, including ones on branches that are no
    /// longer part of the committed path.
    pub fn messages_up_to(&self, uuid: &str) -> Result<Vec<Message>, HistoryError> {
        let mut chain: Vec<Message> = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(uuid.to_string());
        while let Some(current) = cursor {
            if !seen.insert(current.clone()) {
                return Err(HistoryError::Cycle {
                    uuid: uuid.to_string(),
                });
            }
            let message = self
                .get(&current)
                .ok_or_else(|| match chain.last() {
                    None => HistoryError::UnknownMessage {
                        uuid: current.clone(),
                    },
                    Some(child) => HistoryError::DanglingParent {
                        uuid: child.uuid.clone(),
                        parent_uuid: current.clone(),
                    },
                })?;
            cursor = message.parent_uuid.clone();
            chain.push(message.clone());
        }
        chain.reverse();
        Ok(chain)
    }

    /// Replace the committed path wholesale with `messages`.
    ///
    /// New messages are added to the node table; existing nodes must be
    /// byte-for-byte identical. Nothing changes unless every check passes.
    pub fn replace(&mut self, messages: Vec<Message>) -> Result<(), HistoryError> {
        let mut nodes = self.nodes.clone();
        let mut index = self.index.clone();
        let mut path = Vec::with_capacity(messages.len());
        let mut on_path = HashSet::with_capacity(messages.len());

        for message in messages {
            if !on_path.insert(message.uuid.clone()) {
                return Err(HistoryError::DuplicateMessage {
                    uuid: message.uuid.clone(),
                });
            }
            if let Some(parent) = &message.parent_uuid {
                if !index.contains_key(parent) {
                    return Err(HistoryError::DanglingParent {
                        uuid: message.uuid.clone(),
                        parent_uuid: parent.clone(),
                    });
                }
            }
            match index.get(&message.uuid) {
                Some(&position) => {
                    if nodes[position] != message {
                        return Err(HistoryError::ConflictingMessage {
                            uuid: message.uuid.clone(),
                        });
                    }
                }
                None => {
                    index.insert(message.uuid.clone(), nodes.len());
                    nodes.push(message.clone());
                }
            }
            path.push(message.uuid);
        }

        self.nodes = nodes;
        self.index = index;
        self.path = path;
        Ok(())
    }
}
