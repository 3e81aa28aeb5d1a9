// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Event-driven executor for [`StageGraph`]s.
//!
//! The executor expands the graph into stage *instances* keyed by (node, pipeline
//! index, subject index) as the lists that drive the expansion become known: branches
//! open when the iterable completes, and a mapped stage fans out over its subjects once
//! every list it iterates has been produced. Mismatched list lengths are detected at that
//! point, before any instance of the mapped stage exists, and abort the whole run.
//!
//! Instances run on tokio tasks bounded by a semaphore and report back over an
//! unbounded channel; all bookkeeping happens on the event loop, so none of it needs a
//! lock. Joins fill [`JoinGroup`] slots as their sources finish and become ready only
//! when every expected iteration has reported.
//!
//! # Failures
//!
//! A raised error fails exactly one instance. Downstream instances that need its value
//! fail as `upstream` without running, and joins record the failure in the slot of the
//! iteration that produced it. Under [`FailureStrategy::Strict`] the first raised error
//! in a pipeline branch also cancels that branch's token: its running instances are
//! interrupted and everything not yet finished in the branch fails as `aborted`. Other
//! branches are never affected.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::engine::graph::{Binding, Edge, NodeRole, Scope};
use crate::engine::{
    Iteration, IterationContext, JoinGroup, NodeState, PortBindings, PortSpec, PortValue,
    StageCache, StageGraph,
};
use crate::errors::{ExecutionError, FailureStrategy, GraphError, StageError, StageFailure};
use crate::observability::messages::engine::{
    BranchAborted, BranchesOpened, ExecutionCompleted, ExecutionFailed, ExecutionStarted,
    FanOutResolved, StageCacheHit, StageFailed, StageStarted,
};
use crate::observability::messages::StructuredLog;

/// Identity of one stage instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    pub node: usize,
    pub pipeline: Option<usize>,
    pub subject: Option<usize>,
}

impl InstanceKey {
    fn new(node: usize, pipeline: Option<usize>, subject: Option<usize>) -> Self {
        Self {
            node,
            pipeline,
            subject,
        }
    }
}

/// Final record of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub stage: String,
    pub context: IterationContext,
    pub state: NodeState,
    pub outputs: Option<PortBindings>,
    pub failure: Option<StageFailure>,
}

/// Everything that happened in one run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    stages: Vec<String>,
    instances: BTreeMap<InstanceKey, InstanceRecord>,
    duration: Duration,
}

impl ExecutionReport {
    /// The instance of `stage` at the given pipeline and subject index.
    pub fn get(
        &self,
        stage: &str,
        pipeline: Option<usize>,
        subject: Option<usize>,
    ) -> Option<&InstanceRecord> {
        let node = self.stages.iter().position(|name| name == stage)?;
        self.instances.get(&InstanceKey::new(node, pipeline, subject))
    }

    pub fn outputs(
        &self,
        stage: &str,
        pipeline: Option<usize>,
        subject: Option<usize>,
    ) -> Option<&PortBindings> {
        self.get(stage, pipeline, subject)?.outputs.as_ref()
    }

    pub fn instances(&self) -> impl Iterator<Item = (&InstanceKey, &InstanceRecord)> {
        self.instances.iter()
    }

    /// Every instance of `stage`, in (pipeline, subject) order.
    pub fn instances_of<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a InstanceRecord> + 'a {
        self.instances
            .values()
            .filter(move |record| record.stage == stage)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageFailure> {
        self.instances.values().filter_map(|record| record.failure.as_ref())
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.instances
            .values()
            .filter(|record| record.state == state)
            .count()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Runs stage graphs with bounded concurrency and a stage cache that outlives runs.
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    max_concurrency: usize,
    strategy: FailureStrategy,
    cache: Arc<StageCache>,
}

impl WorkflowExecutor {
    pub fn new(max_concurrency: usize, strategy: FailureStrategy) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            strategy,
            cache: Arc::new(StageCache::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<StageCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Number of instances allowed to run at once when none is configured.
    pub fn default_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn strategy(&self) -> FailureStrategy {
        self.strategy
    }

    pub fn cache(&self) -> &Arc<StageCache> {
        &self.cache
    }

    /// Run `graph` to completion.
    ///
    /// Per-instance failures are recorded in the report; only fan-out shape errors,
    /// stalls and internal faults end the run with an error.
    pub async fn execute(&self, graph: &StageGraph) -> Result<ExecutionReport, ExecutionError> {
        let strategy = match self.strategy {
            FailureStrategy::Strict => "strict",
            FailureStrategy::Lenient => "lenient",
        };
        ExecutionStarted {
            stage_count: graph.len(),
            max_concurrency: self.max_concurrency,
            failure_strategy: strategy,
        }
        .log();

        let started = Instant::now();
        let result = self.drive(graph, started).await;
        match &result {
            Ok(report) => ExecutionCompleted {
                instance_count: report.len(),
                failed_count: report.count(NodeState::Failed),
                cached_count: report.count(NodeState::Cached),
                duration: report.duration(),
            }
            .log(),
            Err(error) => ExecutionFailed { error }.log(),
        }
        result
    }

    async fn drive(
        &self,
        graph: &StageGraph,
        started: Instant,
    ) -> Result<ExecutionReport, ExecutionError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let mut run = Run::new(graph, self.strategy);
        let mut in_flight = 0usize;

        let outcome: Result<(), ExecutionError> = loop {
            let ready = match run.schedule() {
                Ok(ready) => ready,
                Err(error) => break Err(error),
            };
            for key in ready {
                run.dispatch(key, &semaphore, &self.cache, &tx);
                in_flight += 1;
            }
            if in_flight == 0 {
                break Ok(());
            }

            let step = match rx.recv().await {
                Some(Event::Started(key)) => run.transition(key, NodeState::Running),
                Some(Event::Finished { key, outcome }) => {
                    in_flight -= 1;
                    run.finish(key, outcome)
                }
                None => Err(ExecutionError::Internal {
                    message: "event channel closed".to_string(),
                }),
            };
            if let Err(error) = step {
                break Err(error);
            }
        };

        if let Err(error) = outcome {
            run.root.cancel();
            return Err(error);
        }
        run.into_report(started.elapsed())
    }
}

impl Default for WorkflowExecutor {
    fn default() -> Self {
        Self::new(Self::default_concurrency(), FailureStrategy::default())
    }
}

enum Event {
    Started(InstanceKey),
    Finished { key: InstanceKey, outcome: Outcome },
}

enum Outcome {
    Completed(PortBindings),
    Cached(PortBindings),
    Failed(StageError),
}

enum Resolution {
    Waiting,
    Failed(StageFailure),
    Ready(PortBindings),
}

/// Result of looking up a value an instance needs.
enum Lookup {
    Waiting,
    Failed(StageFailure),
    Value(PortValue),
}

enum Branches {
    Unknown,
    Open(Vec<Iteration>),
    Failed(StageFailure),
}

struct Instance {
    context: IterationContext,
    state: NodeState,
    inputs: Option<PortBindings>,
    outputs: Option<PortBindings>,
    failure: Option<StageFailure>,
}

/// Subject iterations of one mapped node in one branch, or why there are none.
type Fan = Result<Vec<Iteration>, StageFailure>;

struct Run<'g> {
    graph: &'g StageGraph,
    strategy: FailureStrategy,
    branches: Branches,
    fans: HashMap<(usize, Option<usize>), Fan>,
    instances: BTreeMap<InstanceKey, Instance>,
    joins: HashMap<(usize, Option<usize>), JoinGroup>,
    root: CancellationToken,
    branch_tokens: HashMap<usize, CancellationToken>,
}

impl<'g> Run<'g> {
    fn new(graph: &'g StageGraph, strategy: FailureStrategy) -> Self {
        Self {
            graph,
            strategy,
            branches: Branches::Unknown,
            fans: HashMap::new(),
            instances: BTreeMap::new(),
            joins: HashMap::new(),
            root: CancellationToken::new(),
            branch_tokens: HashMap::new(),
        }
    }

    /// Branch slots instances can be keyed by, once known. A graph without an iterable
    /// has a single unnamed branch.
    fn branch_slots(&self) -> Option<Vec<Option<usize>>> {
        if self.graph.iterable().is_none() {
            return Some(vec![None]);
        }
        match &self.branches {
            Branches::Open(iterations) => Some((0..iterations.len()).map(Some).collect()),
            _ => None,
        }
    }

    fn branch_context(&self, branch: Option<usize>) -> IterationContext {
        match (&self.branches, branch) {
            (Branches::Open(iterations), Some(p)) => iterations
                .get(p)
                .cloned()
                .map(IterationContext::for_pipeline)
                .unwrap_or_default(),
            _ => IterationContext::shared(),
        }
    }

    fn token(&mut self, branch: Option<usize>) -> CancellationToken {
        match branch {
            Some(p) => {
                let root = &self.root;
                self.branch_tokens
                    .entry(p)
                    .or_insert_with(|| root.child_token())
                    .clone()
            }
            None => self.root.clone(),
        }
    }

    fn branch_aborted(&self, branch: Option<usize>) -> bool {
        self.strategy == FailureStrategy::Strict
            && branch
                .and_then(|p| self.branch_tokens.get(&p))
                .is_some_and(|token| token.is_cancelled())
    }

    /// Expand what can be expanded and resolve what can be resolved, until nothing
    /// changes. Returns the instances that became ready.
    fn schedule(&mut self) -> Result<Vec<InstanceKey>, ExecutionError> {
        let mut ready = Vec::new();
        loop {
            let mut progressed = false;
            for &n in self.graph.order() {
                progressed |= self.expand(n)?;
            }

            let pending: Vec<InstanceKey> = self
                .instances
                .iter()
                .filter(|(_, instance)| instance.state == NodeState::Pending)
                .map(|(key, _)| *key)
                .collect();
            for key in pending {
                match self.resolve_inputs(key) {
                    Resolution::Waiting => continue,
                    Resolution::Failed(failure) => self.fail(key, failure)?,
                    Resolution::Ready(inputs) => {
                        self.transition(key, NodeState::Ready)?;
                        self.instance_mut(key)?.inputs = Some(inputs);
                        ready.push(key);
                    }
                }
                progressed = true;
            }

            if !progressed {
                return Ok(ready);
            }
        }
    }

    /// Create the instances of node `n` that are knowable now.
    fn expand(&mut self, n: usize) -> Result<bool, ExecutionError> {
        let graph = self.graph;
        let node = graph.node(n);
        if node.scope == Scope::Shared {
            return Ok(self.create(InstanceKey::new(n, None, None), None));
        }
        let Some(slots) = self.branch_slots() else {
            return Ok(false);
        };

        let mut created = false;
        for branch in slots {
            match node.scope {
                Scope::Shared => {}
                Scope::Branch => created |= self.create(InstanceKey::new(n, branch, None), None),
                Scope::Subject => {
                    if !self.fans.contains_key(&(n, branch)) {
                        match self.resolve_fan(n, branch)? {
                            Some(fan) => {
                                if let Ok(subjects) = &fan {
                                    let context = self.branch_context(branch).to_string();
                                    FanOutResolved {
                                        stage: &node.name,
                                        pipeline: &context,
                                        width: subjects.len(),
                                    }
                                    .log();
                                }
                                self.fans.insert((n, branch), fan);
                            }
                            None => continue,
                        }
                    }
                    let subjects = match self.fans.get(&(n, branch)) {
                        Some(Ok(subjects)) => subjects.clone(),
                        _ => continue,
                    };
                    for subject in subjects {
                        let key = InstanceKey::new(n, branch, Some(subject.index));
                        created |= self.create(key, Some(subject));
                    }
                }
            }
        }
        Ok(created)
    }

    fn create(&mut self, key: InstanceKey, subject: Option<Iteration>) -> bool {
        if self.instances.contains_key(&key) {
            return false;
        }
        let branch = self.branch_context(key.pipeline);
        let context = match subject {
            Some(subject) => branch.with_subject(subject),
            None => branch,
        };
        self.instances.insert(
            key,
            Instance {
                context,
                state: NodeState::Pending,
                inputs: None,
                outputs: None,
                failure: None,
            },
        );
        true
    }

    /// Work out the subjects a mapped node iterates in `branch`.
    ///
    /// `Ok(None)` while an iterated list is still being produced.
    fn resolve_fan(&self, n: usize, branch: Option<usize>) -> Result<Option<Fan>, ExecutionError> {
        let node = self.graph.node(n);
        let context = self.branch_context(branch);
        let mut lengths: Vec<(String, usize)> = Vec::new();
        let mut entity_labels: Option<Vec<Iteration>> = None;
        let mut upstream_labels: Option<Vec<Iteration>> = None;
        let mut list_labels: Option<Vec<Iteration>> = None;

        for &e in node.incoming() {
            let edge = self.graph.edge(e);
            match (edge.binding, edge.source_scope) {
                (Binding::Element, _) => {
                    let items = match self.lookup(edge, branch, None) {
                        Lookup::Waiting => return Ok(None),
                        Lookup::Failed(cause) => {
                            return Ok(Some(Err(StageFailure::upstream(&node.name, &context, &cause))))
                        }
                        Lookup::Value(PortValue::List(items)) => items,
                        Lookup::Value(other) => {
                            let error = StageError::input(
                                &edge.to_port,
                                format!("expected a list to iterate but carries {}", other.describe()),
                            );
                            return Ok(Some(Err(StageFailure::raised(&node.name, &context, &error))));
                        }
                    };
                    lengths.push((edge.to_port.clone(), items.len()));
                    if entity_labels.is_none() && items.iter().all(|v| matches!(v, PortValue::Entities(_))) {
                        entity_labels = Some(labels(&items));
                    }
                    if list_labels.is_none() {
                        list_labels = Some(labels(&items));
                    }
                }
                (Binding::Direct, Scope::Subject) => match self.fans.get(&(edge.from, branch)) {
                    None => return Ok(None),
                    Some(Err(cause)) => {
                        return Ok(Some(Err(StageFailure::upstream(&node.name, &context, cause))))
                    }
                    Some(Ok(subjects)) => {
                        lengths.push((self.graph.node(edge.from).name.clone(), subjects.len()));
                        upstream_labels.get_or_insert_with(|| subjects.clone());
                    }
                },
                _ => {}
            }
        }

        let Some((_, width)) = lengths.first().cloned() else {
            return Err(ExecutionError::Internal {
                message: format!("mapped stage '{}' has nothing to iterate", node.name),
            });
        };
        if lengths.iter().any(|(_, len)| *len != width) {
            return Err(GraphError::MismatchedFanOut {
                context: format!("stage '{}' [{}]", node.name, context),
                lengths,
            }
            .into());
        }

        let subjects = entity_labels
            .or(upstream_labels)
            .or(list_labels)
            .unwrap_or_default();
        Ok(Some(Ok(subjects)))
    }

    /// Value of `edge`'s upstream port as seen from (branch, subject).
    fn lookup(&self, edge: &Edge, branch: Option<usize>, subject: Option<usize>) -> Lookup {
        let from = self.graph.node(edge.from);
        let branch_element = matches!(&from.role, NodeRole::Iterable { port } if *port == edge.from_port);
        let key = if branch_element {
            InstanceKey::new(edge.from, None, None)
        } else {
            match from.scope {
                Scope::Shared => InstanceKey::new(edge.from, None, None),
                Scope::Branch => InstanceKey::new(edge.from, branch, None),
                Scope::Subject => InstanceKey::new(edge.from, branch, subject),
            }
        };

        let Some(instance) = self.instances.get(&key) else {
            return Lookup::Waiting;
        };
        if let Some(failure) = &instance.failure {
            return Lookup::Failed(failure.clone());
        }
        if !instance.state.is_success() {
            return Lookup::Waiting;
        }

        let value = instance
            .outputs
            .as_ref()
            .and_then(|outputs| outputs.get(&edge.from_port).ok())
            .cloned();
        let Some(value) = value else {
            let error = StageError::input(&edge.from_port, "was not produced");
            return Lookup::Failed(StageFailure::raised(&from.name, &instance.context, &error));
        };

        if branch_element {
            return element(value, branch, &from.name, &instance.context, &edge.from_port);
        }
        Lookup::Value(value)
    }

    /// Gathered list for the join input fed by edge `e`, for the join instance in `branch`.
    fn gather(&mut self, e: usize, branch: Option<usize>) -> Lookup {
        let graph = self.graph;
        let edge = graph.edge(e);
        let slots: Vec<(Option<usize>, Option<usize>)> = match edge.source_scope {
            Scope::Branch => match &self.branches {
                Branches::Unknown => return Lookup::Waiting,
                Branches::Failed(cause) => return Lookup::Failed(cause.clone()),
                Branches::Open(iterations) => (0..iterations.len()).map(|p| (Some(p), None)).collect(),
            },
            _ => match self.fans.get(&(edge.from, branch)) {
                None => return Lookup::Waiting,
                Some(Err(cause)) => return Lookup::Failed(cause.clone()),
                Some(Ok(subjects)) => subjects.iter().map(|s| (branch, Some(s.index))).collect(),
            },
        };

        let reports: Vec<(usize, PortValue)> = slots
            .iter()
            .enumerate()
            .filter_map(|(i, (p, s))| match self.lookup(edge, *p, *s) {
                Lookup::Waiting => None,
                Lookup::Failed(failure) => Some((i, PortValue::Failed(failure))),
                Lookup::Value(value) => Some((i, value)),
            })
            .collect();

        let group = self
            .joins
            .entry((e, branch))
            .or_insert_with(|| JoinGroup::new(slots.len()));
        for (i, value) in reports {
            group.report(i, value);
        }
        match group.values() {
            Some(values) => Lookup::Value(PortValue::List(values)),
            None => Lookup::Waiting,
        }
    }

    /// Try to bind every input of a pending instance.
    fn resolve_inputs(&mut self, key: InstanceKey) -> Resolution {
        let graph = self.graph;
        let node = graph.node(key.node);
        let Some(context) = self.instances.get(&key).map(|i| i.context.clone()) else {
            return Resolution::Waiting;
        };
        if self.branch_aborted(key.pipeline) {
            return Resolution::Failed(StageFailure::aborted(&node.name, &context));
        }

        let mut bindings = PortBindings::new();
        for &e in node.incoming() {
            let edge = graph.edge(e);
            let value = match edge.binding {
                Binding::Direct => self.lookup(edge, key.pipeline, key.subject),
                Binding::Element => match self.lookup(edge, key.pipeline, None) {
                    Lookup::Value(list) => {
                        let from = &graph.node(edge.from).name;
                        element(list, key.subject, from, &context, &edge.from_port)
                    }
                    other => other,
                },
                Binding::Gather => self.gather(e, key.pipeline),
            };
            match value {
                Lookup::Waiting => return Resolution::Waiting,
                Lookup::Failed(cause) => {
                    return Resolution::Failed(StageFailure::upstream(&node.name, &context, &cause))
                }
                Lookup::Value(value) => bindings.insert(&edge.to_port, value),
            }
        }
        Resolution::Ready(bindings)
    }

    fn transition(&mut self, key: InstanceKey, next: NodeState) -> Result<(), ExecutionError> {
        let instance = self.instance_mut(key)?;
        if !instance.state.can_transition_to(next) {
            return Err(ExecutionError::Internal {
                message: format!(
                    "illegal transition {} -> {} for [{}]",
                    instance.state, next, instance.context
                ),
            });
        }
        instance.state = next;
        Ok(())
    }

    fn instance_mut(&mut self, key: InstanceKey) -> Result<&mut Instance, ExecutionError> {
        self.instances
            .get_mut(&key)
            .ok_or_else(|| ExecutionError::Internal {
                message: format!("unknown instance {:?}", key),
            })
    }

    fn fail(&mut self, key: InstanceKey, failure: StageFailure) -> Result<(), ExecutionError> {
        self.transition(key, NodeState::Failed)?;
        let instance = self.instance_mut(key)?;
        instance.inputs = None;
        instance.failure = Some(failure);
        Ok(())
    }

    fn dispatch(
        &mut self,
        key: InstanceKey,
        semaphore: &Arc<Semaphore>,
        cache: &Arc<StageCache>,
        tx: &mpsc::UnboundedSender<Event>,
    ) {
        let graph = self.graph;
        let node = graph.node(key.node);
        let stage = node.stage.clone();
        let name = node.name.clone();
        let token = self.token(key.pipeline);
        let (context, inputs) = match self.instances.get_mut(&key) {
            Some(instance) => (instance.context.clone(), instance.inputs.take().unwrap_or_default()),
            None => return,
        };
        let semaphore = semaphore.clone();
        let cache = cache.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let finish = |outcome: Outcome| {
                let _ = tx.send(Event::Finished { key, outcome });
            };

            let permit = tokio::select! {
                _ = token.cancelled() => {
                    finish(Outcome::Failed(StageError::Aborted));
                    return;
                }
                permit = semaphore.acquire_owned() => permit,
            };
            let _permit = match permit {
                Ok(permit) => permit,
                Err(error) => {
                    finish(Outcome::Failed(StageError::Task(error.to_string())));
                    return;
                }
            };
            let _ = tx.send(Event::Started(key));

            let cache_key = if stage.cacheable() {
                StageCache::key(&name, stage.fingerprint().as_deref(), &inputs)
            } else {
                None
            };
            if let Some(hit) = cache_key.as_deref().and_then(|k| cache.get(k)) {
                finish(Outcome::Cached(hit));
                return;
            }

            let label = context.to_string();
            let message = StageStarted {
                stage: &name,
                context: &label,
            };
            message.log();
            let span = message.span("run");

            let result = tokio::select! {
                _ = token.cancelled() => Err(StageError::Aborted),
                result = stage.run(&context, inputs).instrument(span) => result,
            };
            match result {
                Ok(outputs) => {
                    if let Some(k) = cache_key {
                        cache.insert(k, outputs.clone());
                    }
                    finish(Outcome::Completed(outputs));
                }
                Err(error) => finish(Outcome::Failed(error)),
            }
        });
    }

    fn finish(&mut self, key: InstanceKey, outcome: Outcome) -> Result<(), ExecutionError> {
        let graph = self.graph;
        let node = graph.node(key.node);
        let context = self.instance_mut(key)?.context.clone();

        let outcome = match outcome {
            Outcome::Completed(outputs) | Outcome::Cached(outputs)
                if missing_output(&node.stage.outputs(), &outputs).is_some() =>
            {
                let port = missing_output(&node.stage.outputs(), &outputs).unwrap_or_default();
                Outcome::Failed(StageError::Other(format!(
                    "stage did not produce output '{}'",
                    port
                )))
            }
            other => other,
        };

        match outcome {
            Outcome::Completed(outputs) => self.complete(key, NodeState::Completed, outputs),
            Outcome::Cached(outputs) => {
                let label = context.to_string();
                StageCacheHit {
                    stage: &node.name,
                    context: &label,
                }
                .log();
                self.complete(key, NodeState::Cached, outputs)
            }
            Outcome::Failed(error) => {
                let failure = StageFailure::raised(&node.name, &context, &error);
                let label = context.to_string();
                StageFailed {
                    stage: &node.name,
                    context: &label,
                    error: &failure.message,
                }
                .log();
                self.fail(key, failure.clone())?;

                if matches!(node.role, NodeRole::Iterable { .. }) {
                    self.branches = Branches::Failed(failure.clone());
                }
                if self.strategy == FailureStrategy::Strict && !matches!(error, StageError::Aborted) {
                    if let Some(p) = key.pipeline {
                        self.abort_branch(p, &context, &failure);
                    }
                }
                Ok(())
            }
        }
    }

    fn abort_branch(&mut self, p: usize, context: &IterationContext, cause: &StageFailure) {
        let token = self.token(Some(p));
        if token.is_cancelled() {
            return;
        }
        token.cancel();
        BranchAborted {
            pipeline: context.pipeline_name().unwrap_or_default(),
            cause: &cause.to_string(),
        }
        .log();
    }

    fn complete(
        &mut self,
        key: InstanceKey,
        state: NodeState,
        outputs: PortBindings,
    ) -> Result<(), ExecutionError> {
        self.transition(key, state)?;
        let graph = self.graph;
        let node = graph.node(key.node);
        if let NodeRole::Iterable { port } = &node.role {
            self.branches = match outputs.list(port) {
                Ok(items) => {
                    let iterations = labels(items);
                    let names: Vec<String> = iterations.iter().map(|it| it.label.clone()).collect();
                    BranchesOpened {
                        stage: &node.name,
                        pipelines: &names,
                    }
                    .log();
                    Branches::Open(iterations)
                }
                Err(error) => {
                    let context = IterationContext::shared();
                    Branches::Failed(StageFailure::raised(&node.name, &context, &error))
                }
            };
        }
        self.instance_mut(key)?.outputs = Some(outputs);
        Ok(())
    }

    fn into_report(self, duration: Duration) -> Result<ExecutionReport, ExecutionError> {
        let pending: Vec<String> = self
            .instances
            .iter()
            .filter(|(_, instance)| !instance.state.is_terminal())
            .map(|(key, instance)| {
                format!("{} [{}]", self.graph.node(key.node).name, instance.context)
            })
            .collect();
        if !pending.is_empty() {
            return Err(ExecutionError::Stalled { pending });
        }

        let stages = self.graph.nodes().iter().map(|node| node.name.clone()).collect();
        let instances = self
            .instances
            .into_iter()
            .map(|(key, instance)| {
                let record = InstanceRecord {
                    stage: self.graph.node(key.node).name.clone(),
                    context: instance.context,
                    state: instance.state,
                    outputs: instance.outputs,
                    failure: instance.failure,
                };
                (key, record)
            })
            .collect();
        Ok(ExecutionReport {
            stages,
            instances,
            duration,
        })
    }
}

fn element(
    list: PortValue,
    index: Option<usize>,
    stage: &str,
    context: &IterationContext,
    port: &str,
) -> Lookup {
    let PortValue::List(items) = list else {
        let error = StageError::input(port, format!("expected a list but carries {}", list.describe()));
        return Lookup::Failed(StageFailure::raised(stage, context, &error));
    };
    match index.and_then(|i| items.into_iter().nth(i)) {
        Some(value) => Lookup::Value(value),
        None => {
            let error = StageError::input(port, "has no element for this iteration");
            Lookup::Failed(StageFailure::raised(stage, context, &error))
        }
    }
}

fn labels(items: &[PortValue]) -> Vec<Iteration> {
    items
        .iter()
        .enumerate()
        .map(|(i, value)| Iteration::new(i, iteration_label(value, i)))
        .collect()
}

fn iteration_label(value: &PortValue, index: usize) -> String {
    match value {
        PortValue::Pipeline(pipeline) => pipeline.name().to_string(),
        PortValue::Entities(entities) => entities.label(),
        PortValue::Path(path) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("#{}", index)),
        _ => format!("#{}", index),
    }
}

fn missing_output(declared: &[PortSpec], outputs: &PortBindings) -> Option<&'static str> {
    declared
        .iter()
        .map(|spec| spec.name)
        .find(|port| !outputs.contains(port))
}
