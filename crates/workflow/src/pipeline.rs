//! Pipeline construction and execution.
//!
//! Construction resolves every wire against the blocks' declared ports and
//! rejects anything that could not run: unknown ids, type mismatches, inputs
//! with zero or several sources, and cycles. The topological order is fixed at
//! build time. Ties between independent blocks go to the block registered
//! first, so the same pipeline always runs in the same order.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use switchyard_metrics::{counter, histogram, labels, workflow as workflow_metrics};

use crate::{
    block::{Block, BlockInputs},
    error::{FailureReason, PipelineError, Result, RunFailure},
    port::{self, Port, PortValue, PortValues},
};

/// Where a wired input takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A value supplied by the caller when the pipeline runs.
    Entry(String),
    /// An output of another block.
    Output { block: String, port: String },
}

impl Source {
    pub fn entry(name: impl Into<String>) -> Self {
        Self::Entry(name.into())
    }

    pub fn output(block: impl Into<String>, port: impl Into<String>) -> Self {
        Self::Output {
            block: block.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(name) => write!(f, "entry.{name}"),
            Self::Output { block, port } => write!(f, "{block}.{port}"),
        }
    }
}

struct Wire {
    from: Source,
    block: String,
    port: String,
}

struct Exposed {
    name: String,
    block: String,
    port: String,
}

/// Collects blocks and wires. Nothing is checked until [`build`](Self::build).
pub struct PipelineBuilder {
    name: String,
    entries: Vec<Port>,
    blocks: Vec<(String, Arc<dyn Block>)>,
    wires: Vec<Wire>,
    exposed: Vec<Exposed>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            blocks: Vec::new(),
            wires: Vec::new(),
            exposed: Vec::new(),
        }
    }

    /// Declare a caller-supplied input.
    #[must_use]
    pub fn entry(mut self, port: Port) -> Self {
        self.entries.push(port);
        self
    }

    #[must_use]
    pub fn block(self, id: impl Into<String>, block: impl Block + 'static) -> Self {
        self.shared_block(id, Arc::new(block))
    }

    #[must_use]
    pub fn shared_block(mut self, id: impl Into<String>, block: Arc<dyn Block>) -> Self {
        self.blocks.push((id.into(), block));
        self
    }

    /// Bind input `port` of `block` to `from`.
    #[must_use]
    pub fn wire(mut self, from: Source, block: impl Into<String>, port: impl Into<String>) -> Self {
        self.wires.push(Wire {
            from,
            block: block.into(),
            port: port.into(),
        });
        self
    }

    #[must_use]
    pub fn wire_entry(
        self,
        entry: impl Into<String>,
        block: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        self.wire(Source::entry(entry), block, port)
    }

    /// Wire `from_block.from_port` → `to_block.to_port`.
    #[must_use]
    pub fn connect(
        self,
        from_block: impl Into<String>,
        from_port: impl Into<String>,
        to_block: impl Into<String>,
        to_port: impl Into<String>,
    ) -> Self {
        self.wire(Source::output(from_block, from_port), to_block, to_port)
    }

    /// Publish a block output under `name` in the run result.
    #[must_use]
    pub fn expose(
        mut self,
        name: impl Into<String>,
        block: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        self.exposed.push(Exposed {
            name: name.into(),
            block: block.into(),
            port: port.into(),
        });
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let count = self.blocks.len();

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(count);
        for (i, (id, block)) in self.blocks.iter().enumerate() {
            if index.insert(id.as_str(), i).is_some() {
                return Err(PipelineError::DuplicateBlock { block: id.clone() });
            }
            unique_ports(id, block.inputs())?;
            unique_ports(id, block.outputs())?;
        }

        let mut entry_names = HashSet::new();
        for entry in &self.entries {
            if !entry_names.insert(entry.name.as_str()) {
                return Err(PipelineError::DuplicateEntry {
                    name: entry.name.clone(),
                });
            }
        }

        let lookup = |id: &str| {
            index
                .get(id)
                .copied()
                .ok_or_else(|| PipelineError::UnknownBlock {
                    block: id.to_string(),
                })
        };

        let mut bindings: Vec<BTreeMap<String, Source>> = vec![BTreeMap::new(); count];
        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];

        for wire in &self.wires {
            let to = lookup(&wire.block)?;
            let target = port::find(self.blocks[to].1.inputs(), &wire.port).ok_or_else(|| {
                PipelineError::UnknownPort {
                    block: wire.block.clone(),
                    port: wire.port.clone(),
                    direction: "input",
                }
            })?;

            let found = match &wire.from {
                Source::Entry(name) => {
                    let entry = port::find(&self.entries, name)
                        .ok_or_else(|| PipelineError::UnknownEntry { name: name.clone() })?;
                    // The caller may omit an optional entry, which would leave the
                    // input empty at run time.
                    if target.required && !entry.required {
                        return Err(PipelineError::OptionalEntryFeedsRequired {
                            entry: name.clone(),
                            block: wire.block.clone(),
                            port: wire.port.clone(),
                        });
                    }
                    entry.port_type
                },
                Source::Output { block, port } => {
                    let from = lookup(block)?;
                    let produced = port::find(self.blocks[from].1.outputs(), port).ok_or_else(
                        || PipelineError::UnknownPort {
                            block: block.clone(),
                            port: port.clone(),
                            direction: "output",
                        },
                    )?;
                    edges[from].insert(to);
                    produced.port_type
                },
            };

            if found != target.port_type {
                return Err(PipelineError::TypeMismatch {
                    from: wire.from.to_string(),
                    to: format!("{}.{}", wire.block, wire.port),
                    expected: target.port_type,
                    found,
                });
            }

            if bindings[to]
                .insert(wire.port.clone(), wire.from.clone())
                .is_some()
            {
                return Err(PipelineError::MultipleSources {
                    block: wire.block.clone(),
                    port: wire.port.clone(),
                });
            }
        }

        if let Some(cycle) = find_cycle(&edges) {
            return Err(PipelineError::Cycle {
                blocks: cycle.into_iter().map(|i| self.blocks[i].0.clone()).collect(),
            });
        }

        for (i, (id, block)) in self.blocks.iter().enumerate() {
            if let Some(port) = block
                .inputs()
                .iter()
                .find(|p| p.required && !bindings[i].contains_key(&p.name))
            {
                return Err(PipelineError::UnsatisfiedInput {
                    block: id.clone(),
                    port: port.name.clone(),
                });
            }
        }

        for exposed in &self.exposed {
            let i = lookup(&exposed.block)?;
            if port::find(self.blocks[i].1.outputs(), &exposed.port).is_none() {
                return Err(PipelineError::UnknownPort {
                    block: exposed.block.clone(),
                    port: exposed.port.clone(),
                    direction: "output",
                });
            }
        }

        let order = topological_order(&edges);

        let nodes = self
            .blocks
            .into_iter()
            .zip(bindings)
            .map(|((id, block), bindings)| Node {
                id,
                block,
                bindings,
            })
            .collect();

        Ok(Pipeline {
            name: self.name,
            entries: self.entries,
            nodes,
            order,
            exposed: self.exposed,
        })
    }
}

fn unique_ports(block: &str, ports: &[Port]) -> Result<()> {
    let mut seen = HashSet::new();
    for port in ports {
        if !seen.insert(port.name.as_str()) {
            return Err(PipelineError::DuplicatePort {
                block: block.to_string(),
                port: port.name.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first search with an explicit recursion stack. Returns the nodes of
/// the first cycle found, closing node repeated at the end.
fn find_cycle(edges: &[BTreeSet<usize>]) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; edges.len()];
    let mut stack = Vec::new();
    (0..edges.len()).find_map(|start| {
        if marks[start] == Mark::Unvisited {
            visit(start, edges, &mut marks, &mut stack)
        } else {
            None
        }
    })
}

fn visit(
    node: usize,
    edges: &[BTreeSet<usize>],
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    marks[node] = Mark::OnStack;
    stack.push(node);
    for &next in &edges[node] {
        match marks[next] {
            Mark::OnStack => {
                let start = stack.iter().position(|&n| n == next)?;
                let mut cycle = stack[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            },
            Mark::Unvisited => {
                if let Some(cycle) = visit(next, edges, marks, stack) {
                    return Some(cycle);
                }
            },
            Mark::Done => {},
        }
    }
    stack.pop();
    marks[node] = Mark::Done;
    None
}

/// Kahn's algorithm; the ready set is ordered by registration index.
fn topological_order(edges: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut indegree = vec![0_usize; edges.len()];
    for targets in edges {
        for &t in targets {
            indegree[t] += 1;
        }
    }
    let mut ready: BTreeSet<usize> = (0..edges.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(edges.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &t in &edges[next] {
            indegree[t] -= 1;
            if indegree[t] == 0 {
                ready.insert(t);
            }
        }
    }
    order
}

struct Node {
    id: String,
    block: Arc<dyn Block>,
    bindings: BTreeMap<String, Source>,
}

/// A validated, runnable block graph.
pub struct Pipeline {
    name: String,
    entries: Vec<Port>,
    nodes: Vec<Node>,
    order: Vec<usize>,
    exposed: Vec<Exposed>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("order", &self.execution_order())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[Port] {
        &self.entries
    }

    /// Block ids in the order they run.
    pub fn execution_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.nodes[i].id.as_str())
            .collect()
    }

    /// Run with a token nobody else holds.
    pub async fn execute(&self, entries: PortValues) -> std::result::Result<PipelineOutput, RunFailure> {
        self.run(entries, &CancellationToken::new()).await
    }

    /// Run every block once in topological order.
    ///
    /// `cancel` is checked before each block starts. A block already running is
    /// allowed to finish; its outputs are kept in the failure.
    pub async fn run(
        &self,
        entries: PortValues,
        cancel: &CancellationToken,
    ) -> std::result::Result<PipelineOutput, RunFailure> {
        let started = Instant::now();
        let mut produced: BTreeMap<String, PortValues> = BTreeMap::new();

        #[cfg(feature = "metrics")]
        counter!(workflow_metrics::RUNS_TOTAL, labels::WORKFLOW => self.name.clone()).increment(1);

        for port in &self.entries {
            let reason = match entries.get(&port.name) {
                None if port.required => FailureReason::MissingEntry {
                    name: port.name.clone(),
                },
                Some(value) if value.port_type() != port.port_type => FailureReason::EntryType {
                    name: port.name.clone(),
                    expected: port.port_type,
                    found: value.port_type(),
                },
                _ => continue,
            };
            return Err(self.fail(None, reason, produced));
        }

        for &i in &self.order {
            let node = &self.nodes[i];
            if cancel.is_cancelled() {
                debug!(pipeline = %self.name, block = %node.id, "cancelled before block");
                return Err(self.fail(Some(&node.id), FailureReason::Cancelled, produced));
            }

            let mut values = PortValues::new();
            for (input, source) in &node.bindings {
                let value = match source {
                    Source::Entry(name) => entries.get(name),
                    Source::Output { block, port } => {
                        produced.get(block).and_then(|out| out.get(port))
                    },
                };
                if let Some(value) = value {
                    values.insert(input.clone(), value.clone());
                }
            }

            debug!(pipeline = %self.name, block = %node.id, kind = node.block.kind(), "running block");
            let block_started = Instant::now();
            let result = node.block.execute(BlockInputs::new(values)).await;

            #[cfg(feature = "metrics")]
            histogram!(
                workflow_metrics::BLOCK_DURATION_SECONDS,
                labels::BLOCK => node.block.kind().to_string()
            )
            .record(block_started.elapsed().as_secs_f64());

            let outputs = match result {
                Ok(outputs) => outputs,
                Err(e) => {
                    warn!(pipeline = %self.name, block = %node.id, error = %format!("{e:#}"), "block failed");
                    let reason = FailureReason::Execution {
                        message: format!("{e:#}"),
                    };
                    return Err(self.fail(Some(&node.id), reason, produced));
                },
            };
            let outputs = match check_outputs(node.block.outputs(), outputs) {
                Ok(outputs) => outputs,
                Err(reason) => {
                    warn!(pipeline = %self.name, block = %node.id, %reason, "block broke its output contract");
                    return Err(self.fail(Some(&node.id), reason, produced));
                },
            };
            debug!(
                pipeline = %self.name,
                block = %node.id,
                elapsed_ms = block_started.elapsed().as_millis() as u64,
                "block done"
            );
            produced.insert(node.id.clone(), outputs);
        }

        let exposed = self
            .exposed
            .iter()
            .filter_map(|e| {
                produced
                    .get(&e.block)
                    .and_then(|out| out.get(&e.port))
                    .map(|v| (e.name.clone(), v.clone()))
            })
            .collect();

        let elapsed = started.elapsed();
        #[cfg(feature = "metrics")]
        histogram!(workflow_metrics::RUN_DURATION_SECONDS, labels::WORKFLOW => self.name.clone())
            .record(elapsed.as_secs_f64());

        Ok(PipelineOutput {
            pipeline: self.name.clone(),
            produced,
            exposed,
            elapsed,
        })
    }

    fn fail(
        &self,
        block: Option<&str>,
        reason: FailureReason,
        produced: BTreeMap<String, PortValues>,
    ) -> RunFailure {
        #[cfg(feature = "metrics")]
        counter!(workflow_metrics::RUN_FAILURES_TOTAL, labels::WORKFLOW => self.name.clone())
            .increment(1);

        RunFailure {
            pipeline: self.name.clone(),
            block: block.map(str::to_string),
            reason,
            produced,
        }
    }
}

/// Keep exactly the declared outputs, each with its declared type.
fn check_outputs(
    declared: &[Port],
    mut outputs: PortValues,
) -> std::result::Result<PortValues, FailureReason> {
    let mut checked = PortValues::new();
    for port in declared {
        let value = outputs
            .remove(&port.name)
            .ok_or_else(|| FailureReason::MissingOutput {
                port: port.name.clone(),
            })?;
        if value.port_type() != port.port_type {
            return Err(FailureReason::OutputType {
                port: port.name.clone(),
                expected: port.port_type,
                found: value.port_type(),
            });
        }
        checked.insert(port.name.clone(), value);
    }
    if !outputs.is_empty() {
        debug!(ports = ?outputs.keys().collect::<Vec<_>>(), "dropping undeclared outputs");
    }
    Ok(checked)
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub pipeline: String,
    /// Every block's outputs, by block id.
    pub produced: BTreeMap<String, PortValues>,
    /// Outputs published with [`PipelineBuilder::expose`].
    pub exposed: PortValues,
    pub elapsed: Duration,
}

impl PipelineOutput {
    pub fn get(&self, block: &str, port: &str) -> Option<&PortValue> {
        self.produced.get(block).and_then(|out| out.get(port))
    }

    pub fn exposed(&self, name: &str) -> Option<&PortValue> {
        self.exposed.get(name)
    }

    /// Rendered `reply` output, if the pipeline exposes one.
    pub fn reply(&self) -> Option<String> {
        self.exposed("reply").map(PortValue::render)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {anyhow::bail, async_trait::async_trait};

    use {super::*, crate::port::PortType};

    type Step = Box<dyn Fn(BlockInputs) -> anyhow::Result<PortValues> + Send + Sync>;

    /// Block whose behaviour is a closure; records its id into `log` when run.
    struct TestBlock {
        inputs: Vec<Port>,
        outputs: Vec<Port>,
        log: Arc<Mutex<Vec<String>>>,
        tag: String,
        step: Step,
    }

    #[async_trait]
    impl Block for TestBlock {
        fn kind(&self) -> &str {
            "test"
        }

        fn inputs(&self) -> &[Port] {
            &self.inputs
        }

        fn outputs(&self) -> &[Port] {
            &self.outputs
        }

        async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
            self.log.lock().unwrap().push(self.tag.clone());
            (self.step)(inputs)
        }
    }

    fn text(name: &str) -> Port {
        Port::required(name, PortType::Text, "")
    }

    fn block(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &str,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
        step: impl Fn(BlockInputs) -> anyhow::Result<PortValues> + Send + Sync + 'static,
    ) -> TestBlock {
        TestBlock {
            inputs,
            outputs,
            log: Arc::clone(log),
            tag: tag.to_string(),
            step: Box::new(step),
        }
    }

    /// Appends `suffix` to input `x`, producing output `x`.
    fn append(log: &Arc<Mutex<Vec<String>>>, tag: &str, suffix: &'static str) -> TestBlock {
        block(log, tag, vec![text("x")], vec![text("x")], move |inputs| {
            let x = inputs.text("x")?;
            Ok(PortValues::from([("x".into(), format!("{x}{suffix}").into())]))
        })
    }

    /// No inputs, emits constant `x`.
    fn source(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> TestBlock {
        let value = tag.to_string();
        block(log, tag, vec![], vec![text("x")], move |_| {
            Ok(PortValues::from([("x".into(), value.as_str().into())]))
        })
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(x: &str) -> PortValues {
        PortValues::from([("x".into(), x.into())])
    }

    #[tokio::test]
    async fn linear_chain_runs_in_order() {
        let log = log();
        let pipeline = PipelineBuilder::new("chain")
            .entry(text("x"))
            .block("c", append(&log, "c", "3"))
            .block("b", append(&log, "b", "2"))
            .block("a", append(&log, "a", "1"))
            .wire_entry("x", "a", "x")
            .connect("a", "x", "b", "x")
            .connect("b", "x", "c", "x")
            .expose("reply", "c", "x")
            .build()
            .unwrap();

        assert_eq!(pipeline.execution_order(), vec!["a", "b", "c"]);
        let out = pipeline.execute(entries("0")).await.unwrap();
        assert_eq!(out.reply().as_deref(), Some("0123"));
        assert_eq!(out.get("a", "x"), Some(&PortValue::from("01")));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn independent_blocks_keep_registration_order() {
        let log = log();
        let pipeline = PipelineBuilder::new("ties")
            .block("z", source(&log, "z"))
            .block("a", source(&log, "a"))
            .block("m", source(&log, "m"))
            .build()
            .unwrap();
        assert_eq!(pipeline.execution_order(), vec!["z", "a", "m"]);
    }

    #[test]
    fn diamond_orders_deterministically() {
        let log = log();
        let join = block(
            &log,
            "join",
            vec![text("l"), text("r")],
            vec![],
            |_| Ok(PortValues::new()),
        );
        let pipeline = PipelineBuilder::new("diamond")
            .block("root", source(&log, "root"))
            .block("right", append(&log, "right", "r"))
            .block("left", append(&log, "left", "l"))
            .block("join", join)
            .connect("root", "x", "left", "x")
            .connect("root", "x", "right", "x")
            .connect("left", "x", "join", "l")
            .connect("right", "x", "join", "r")
            .build()
            .unwrap();
        assert_eq!(pipeline.execution_order(), vec!["root", "right", "left", "join"]);
    }

    #[test]
    fn wiring_into_a_block_without_that_input_is_rejected() {
        let log = log();
        let consumer = block(&log, "b", vec![text("x")], vec![], |_| Ok(PortValues::new()));
        let err = PipelineBuilder::new("reverse")
            .block("a", source(&log, "a"))
            .block("b", consumer)
            .connect("b", "x", "a", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPort { .. }), "{err}");
    }

    #[test]
    fn reverse_wiring_forms_a_cycle() {
        let log = log();
        // a.x → b.x is the intended direction; adding b.x → a.x closes the loop.
        let err = PipelineBuilder::new("reverse")
            .block("a", append(&log, "a", "1"))
            .block("b", append(&log, "b", "2"))
            .connect("a", "x", "b", "x")
            .wire(Source::output("b", "x"), "a", "x")
            .build()
            .unwrap_err();
        match err {
            PipelineError::Cycle { blocks } => {
                assert!(blocks.contains(&"a".to_string()) && blocks.contains(&"b".to_string()));
            },
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[tokio::test]
    async fn optional_entry_cannot_feed_a_required_input() {
        let log = log();
        let err = PipelineBuilder::new("p")
            .entry(Port::optional("x", PortType::Text, ""))
            .block("a", append(&log, "a", "1"))
            .wire_entry("x", "a", "x")
            .build()
            .unwrap_err();
        assert_eq!(err, PipelineError::OptionalEntryFeedsRequired {
            entry: "x".into(),
            block: "a".into(),
            port: "x".into(),
        });
        assert_eq!(err.block(), Some("a"));

        // Declaring the entry required makes the same wiring valid; omitting it
        // is then reported before any block runs.
        let pipeline = PipelineBuilder::new("p")
            .entry(text("x"))
            .block("a", append(&log, "a", "1"))
            .wire_entry("x", "a", "x")
            .build()
            .unwrap();
        let failure = pipeline.execute(PortValues::new()).await.unwrap_err();
        assert_eq!(failure.block, None);
        assert!(matches!(failure.reason, FailureReason::MissingEntry { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn optional_entry_may_feed_an_optional_input() {
        let log = log();
        let reader = block(
            &log,
            "r",
            vec![Port::optional("hint", PortType::Text, "")],
            vec![text("x")],
            |inputs| {
                let hint = inputs.optional_text("hint").unwrap_or("none");
                Ok(PortValues::from([("x".into(), hint.into())]))
            },
        );
        let pipeline = PipelineBuilder::new("opt")
            .entry(Port::optional("hint", PortType::Text, ""))
            .block("r", reader)
            .wire_entry("hint", "r", "hint")
            .expose("reply", "r", "x")
            .build()
            .unwrap();
        let out = pipeline.execute(PortValues::new()).await.unwrap();
        assert_eq!(out.reply().as_deref(), Some("none"));
        let out = pipeline
            .execute(PortValues::from([("hint".into(), "given".into())]))
            .await
            .unwrap();
        assert_eq!(out.reply().as_deref(), Some("given"));
    }

    #[test]
    fn two_block_cycle_is_rejected() {
        let log = log();
        let err = PipelineBuilder::new("loop")
            .block("a", append(&log, "a", "1"))
            .block("b", append(&log, "b", "2"))
            .connect("a", "x", "b", "x")
            .connect("b", "x", "a", "x")
            .build()
            .unwrap_err();
        match err {
            PipelineError::Cycle { blocks } => assert_eq!(blocks, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let log = log();
        let err = PipelineBuilder::new("self")
            .block("a", append(&log, "a", "1"))
            .connect("a", "x", "a", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cycle { .. }));
    }

    #[test]
    fn unwired_required_input_is_rejected() {
        let log = log();
        let err = PipelineBuilder::new("open")
            .block("a", append(&log, "a", "1"))
            .build()
            .unwrap_err();
        assert_eq!(err, PipelineError::UnsatisfiedInput {
            block: "a".into(),
            port: "x".into(),
        });
    }

    #[tokio::test]
    async fn optional_input_may_stay_unwired() {
        let log = log();
        let reader = block(
            &log,
            "r",
            vec![Port::optional("hint", PortType::Text, "")],
            vec![text("x")],
            |inputs| {
                let hint = inputs.optional_text("hint").unwrap_or("none");
                Ok(PortValues::from([("x".into(), hint.into())]))
            },
        );
        let pipeline = PipelineBuilder::new("opt")
            .block("r", reader)
            .expose("reply", "r", "x")
            .build()
            .unwrap();
        let out = pipeline.execute(PortValues::new()).await.unwrap();
        assert_eq!(out.reply().as_deref(), Some("none"));
    }

    #[test]
    fn second_source_for_an_input_is_rejected() {
        let log = log();
        let err = PipelineBuilder::new("twice")
            .entry(text("x"))
            .block("s", source(&log, "s"))
            .block("a", append(&log, "a", "1"))
            .wire_entry("x", "a", "x")
            .connect("s", "x", "a", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::MultipleSources { .. }));
    }

    #[test]
    fn mismatched_types_are_rejected() {
        let log = log();
        let err = PipelineBuilder::new("types")
            .entry(Port::required("n", PortType::Integer, ""))
            .block("a", append(&log, "a", "1"))
            .wire_entry("n", "a", "x")
            .build()
            .unwrap_err();
        assert_eq!(err, PipelineError::TypeMismatch {
            from: "entry.n".into(),
            to: "a.x".into(),
            expected: PortType::Text,
            found: PortType::Integer,
        });
    }

    #[test]
    fn duplicate_ids_and_unknown_references_are_rejected() {
        let log = log();
        let err = PipelineBuilder::new("dup")
            .block("a", source(&log, "a"))
            .block("a", source(&log, "a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateBlock { .. }));

        let err = PipelineBuilder::new("ghost")
            .block("a", append(&log, "a", "1"))
            .connect("ghost", "x", "a", "x")
            .build()
            .unwrap_err();
        assert_eq!(err.block(), Some("ghost"));

        let err = PipelineBuilder::new("entry")
            .block("a", append(&log, "a", "1"))
            .wire_entry("missing", "a", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownEntry { .. }));
    }

    #[tokio::test]
    async fn failure_keeps_partial_outputs_and_stops() {
        let log = log();
        let broken = block(&log, "b", vec![text("x")], vec![text("x")], |_| {
            bail!("model unavailable")
        });
        let pipeline = PipelineBuilder::new("partial")
            .entry(text("x"))
            .block("a", append(&log, "a", "1"))
            .block("b", broken)
            .block("c", append(&log, "c", "3"))
            .wire_entry("x", "a", "x")
            .connect("a", "x", "b", "x")
            .connect("b", "x", "c", "x")
            .build()
            .unwrap();

        let failure = pipeline.execute(entries("0")).await.unwrap_err();
        assert_eq!(failure.block.as_deref(), Some("b"));
        assert!(failure.to_string().contains("model unavailable"));
        assert_eq!(failure.produced["a"]["x"], PortValue::from("01"));
        assert!(!failure.produced.contains_key("c"));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn cancellation_is_observed_at_the_next_boundary() {
        let log = log();
        let token = CancellationToken::new();
        let trigger = token.clone();
        let canceller = block(&log, "a", vec![], vec![text("x")], move |_| {
            trigger.cancel();
            Ok(PortValues::from([("x".into(), "done".into())]))
        });
        let pipeline = PipelineBuilder::new("cancel")
            .block("a", canceller)
            .block("b", append(&log, "b", "2"))
            .connect("a", "x", "b", "x")
            .build()
            .unwrap();

        let failure = pipeline.run(PortValues::new(), &token).await.unwrap_err();
        assert!(failure.is_cancelled());
        assert_eq!(failure.block.as_deref(), Some("b"));
        assert_eq!(failure.produced["a"]["x"], PortValue::from("done"));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn entry_inputs_are_checked_before_running() {
        let log = log();
        let pipeline = PipelineBuilder::new("entries")
            .entry(text("x"))
            .block("a", append(&log, "a", "1"))
            .wire_entry("x", "a", "x")
            .build()
            .unwrap();

        let missing = pipeline.execute(PortValues::new()).await.unwrap_err();
        assert!(matches!(missing.reason, FailureReason::MissingEntry { .. }));
        assert_eq!(missing.block, None);

        let wrong = pipeline
            .execute(PortValues::from([("x".into(), PortValue::Integer(1))]))
            .await
            .unwrap_err();
        assert!(matches!(wrong.reason, FailureReason::EntryType { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_declared_output_fails_the_block() {
        let log = log();
        let lazy = block(&log, "a", vec![], vec![text("x")], |_| Ok(PortValues::new()));
        let pipeline = PipelineBuilder::new("lazy").block("a", lazy).build().unwrap();
        let failure = pipeline.execute(PortValues::new()).await.unwrap_err();
        assert!(matches!(failure.reason, FailureReason::MissingOutput { .. }));
    }
}
