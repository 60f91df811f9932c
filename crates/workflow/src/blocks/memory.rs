use std::sync::Arc;

use {
    async_trait::async_trait,
    switchyard_memory::{
        MemoryComposer, MemoryDecomposer, MemoryManager, MemoryScope, registry::DEFAULT_NAME,
    },
};

use crate::{
    block::{Block, BlockInputs},
    port::{Port, PortType, PortValue, PortValues},
};

/// Reads the sender's memory scope and renders it as context text.
///
/// Input `msg`, output `memory_content`.
pub struct ChatMemoryQuery {
    memory: Arc<MemoryManager>,
    scope: Arc<dyn MemoryScope>,
    decomposer: Arc<dyn MemoryDecomposer>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl ChatMemoryQuery {
    /// `scope` of `None` selects the manager's default scope.
    pub fn new(memory: Arc<MemoryManager>, scope: Option<&str>) -> switchyard_memory::Result<Self> {
        let scope = memory.scope(scope)?;
        let decomposer = memory.decomposer(DEFAULT_NAME)?;
        Ok(Self {
            memory,
            scope,
            decomposer,
            inputs: vec![Port::required("msg", PortType::Message, "inbound message")],
            outputs: vec![Port::required(
                "memory_content",
                PortType::Text,
                "rendered conversation history",
            )],
        })
    }

    pub fn with_decomposer(mut self, name: &str) -> switchyard_memory::Result<Self> {
        self.decomposer = self.memory.decomposer(name)?;
        Ok(self)
    }
}

#[async_trait]
impl Block for ChatMemoryQuery {
    fn kind(&self) -> &str {
        "chat_memory_query"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
        let msg = inputs.message("msg")?;
        let entries = self.memory.query(&*self.scope, &msg.identity()).await;
        let content = self.decomposer.decompose(&entries);
        Ok(PortValues::from([(
            "memory_content".to_string(),
            PortValue::Text(content),
        )]))
    }
}

/// Appends the user message and the reply to the sender's memory scope.
///
/// Inputs `user_msg` and `llm_resp`, no outputs.
pub struct ChatMemoryStore {
    memory: Arc<MemoryManager>,
    scope: Arc<dyn MemoryScope>,
    composer: Arc<dyn MemoryComposer>,
    inputs: Vec<Port>,
}

impl ChatMemoryStore {
    pub fn new(memory: Arc<MemoryManager>, scope: Option<&str>) -> switchyard_memory::Result<Self> {
        let scope = memory.scope(scope)?;
        let composer = memory.composer(DEFAULT_NAME)?;
        Ok(Self {
            memory,
            scope,
            composer,
            inputs: vec![
                Port::required("user_msg", PortType::Message, "message being answered"),
                Port::required("llm_resp", PortType::Response, "generated reply"),
            ],
        })
    }
}

#[async_trait]
impl Block for ChatMemoryStore {
    fn kind(&self) -> &str {
        "chat_memory_store"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &[]
    }

    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
        let msg = inputs.message("user_msg")?;
        let resp = inputs.response("llm_resp")?;
        let identity = msg.identity();
        for draft in [
            self.composer.compose(msg.into()),
            self.composer.compose(resp.into()),
        ] {
            self.memory.store(&*self.scope, &identity, draft).await;
        }
        Ok(PortValues::new())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        switchyard_common::{GeneratedResponse, InboundMessage},
        switchyard_memory::persistence_memory::InMemoryPersistence,
    };

    fn manager() -> Arc<MemoryManager> {
        Arc::new(MemoryManager::new(10, "member", Arc::new(InMemoryPersistence::new())).unwrap())
    }

    fn inputs(pairs: Vec<(&str, PortValue)>) -> BlockInputs {
        BlockInputs::new(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[tokio::test]
    async fn store_then_query_round_trip() {
        let memory = manager();
        let store = ChatMemoryStore::new(Arc::clone(&memory), None).unwrap();
        let query = ChatMemoryQuery::new(Arc::clone(&memory), None).unwrap();

        let msg = InboundMessage::new("alice", "hello");
        store
            .execute(inputs(vec![
                ("user_msg", msg.clone().into()),
                ("llm_resp", GeneratedResponse::new("hi alice").into()),
            ]))
            .await
            .unwrap();

        let out = query.execute(inputs(vec![("msg", msg.into())])).await.unwrap();
        assert_eq!(
            out["memory_content"],
            PortValue::from("[user] alice: hello\n[assistant] assistant: hi alice")
        );
    }

    #[tokio::test]
    async fn query_only_sees_own_scope() {
        let memory = manager();
        let store = ChatMemoryStore::new(Arc::clone(&memory), None).unwrap();
        store
            .execute(inputs(vec![
                ("user_msg", InboundMessage::new("alice", "secret").into()),
                ("llm_resp", GeneratedResponse::new("noted").into()),
            ]))
            .await
            .unwrap();

        let query = ChatMemoryQuery::new(memory, None).unwrap();
        let out = query
            .execute(inputs(vec![("msg", InboundMessage::new("bob", "hi").into())]))
            .await
            .unwrap();
        assert_eq!(out["memory_content"], PortValue::from(""));
    }

    #[test]
    fn unknown_scope_or_decomposer_is_rejected() {
        let memory = manager();
        assert!(ChatMemoryQuery::new(Arc::clone(&memory), Some("team")).is_err());
        let query = ChatMemoryQuery::new(memory, Some("global")).unwrap();
        assert!(query.with_decomposer("missing").is_err());
    }
}
