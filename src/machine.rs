//! Machine spawning, the serialized event-queue worker, and caller-facing
//! handles.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::context::TransitionContext;
use crate::definition::Definition;
use crate::error::{FireError, SpawnError};
use crate::name::{EventName, StateName};
use crate::pipeline::{self, FireOutcome};
use crate::resolver;

/// Default capacity of a machine's event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How the worker winds down after termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownMode {
    /// Process everything already admitted to the queue, then stop.
    Graceful,
    /// Stop immediately, dropping unprocessed events.
    Immediate,
}

/// One queued firing request.
struct FireRequest {
    event: EventName,
    args: Vec<Value>,
    reply: Option<oneshot::Sender<FireOutcome>>,
}

/// Options for [`StateMachine::spawn_with`].
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    /// Initial-state override; resolves a
    /// [`InitialState::at_spawn`](crate::InitialState::at_spawn) declaration
    /// or replaces the declared initial target.
    pub initial: Option<StateName>,
    /// Event-queue capacity. Producers awaiting `send` park once the queue
    /// is full; [`MachineHandle::try_fire`] reports
    /// [`FireError::QueueFull`] instead.
    pub queue_capacity: usize,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            initial: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// The transition engine: owns the current state and the definition, and
/// processes fired events one at a time.
///
/// A machine runs as a spawned worker task; callers interact with it only
/// through the [`MachineHandle`] returned by the `spawn` constructors, so
/// the current state is never mutated from a caller thread.
pub struct StateMachine {
    definition: Arc<Definition>,
    current: StateName,
    state_tx: watch::Sender<StateName>,
}

impl StateMachine {
    /// Spawn a machine with the definition's declared initial state.
    pub fn spawn(definition: Definition) -> Result<(MachineHandle, MachineTask), SpawnError> {
        Self::spawn_with(definition, SpawnOptions::default())
    }

    /// Spawn a machine starting from `initial`.
    pub fn spawn_at(
        definition: Definition,
        initial: impl Into<StateName>,
    ) -> Result<(MachineHandle, MachineTask), SpawnError> {
        Self::spawn_with(
            definition,
            SpawnOptions {
                initial: Some(initial.into()),
                ..SpawnOptions::default()
            },
        )
    }

    /// Spawn a machine with explicit options.
    ///
    /// Must be called from within a tokio runtime. The worker task runs
    /// until [`MachineHandle::terminate`] is called or every handle is
    /// dropped.
    pub fn spawn_with(
        definition: Definition,
        options: SpawnOptions,
    ) -> Result<(MachineHandle, MachineTask), SpawnError> {
        let (definition, plan) = definition.finalize_initial(options.initial)?;
        let definition = Arc::new(definition);

        let (event_tx, event_rx) = mpsc::channel(options.queue_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(plan.start.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        let dead = Arc::new(AtomicBool::new(false));

        let machine = StateMachine {
            definition: Arc::clone(&definition),
            current: plan.start,
            state_tx,
        };
        let handle = tokio::spawn(machine.run(event_rx, shutdown_rx, plan.auto_fire));

        Ok((
            MachineHandle {
                definition,
                event_tx,
                state_rx,
                shutdown_tx: Arc::new(shutdown_tx),
                dead,
            },
            MachineTask { handle },
        ))
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<FireRequest>,
        mut shutdown: watch::Receiver<Option<ShutdownMode>>,
        auto_fire: Option<EventName>,
    ) -> StateName {
        if let Some(event) = auto_fire {
            self.process(FireRequest {
                event,
                args: Vec::new(),
                reply: None,
            });
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Every handle is gone; drain what was admitted and
                        // stop.
                        while let Ok(request) = events.try_recv() {
                            self.process(request);
                        }
                        break;
                    }
                    let mode = *shutdown.borrow();
                    match mode {
                        None => {}
                        Some(ShutdownMode::Immediate) => break,
                        Some(ShutdownMode::Graceful) => {
                            while let Ok(request) = events.try_recv() {
                                self.process(request);
                            }
                            break;
                        }
                    }
                }
                request = events.recv() => {
                    let Some(request) = request else { break };
                    self.process(request);
                }
            }
        }

        tracing::debug!(state = %self.current, "machine stopped");
        self.current
    }

    fn process(&mut self, request: FireRequest) {
        let FireRequest { event, args, reply } = request;
        let outcome = match resolver::resolve(&self.definition, &self.current, &event) {
            None => {
                tracing::debug!(%event, state = %self.current, "no transition");
                FireOutcome::NoTransition
            }
            Some(resolved) => {
                let ctx = TransitionContext::new(event, resolved.from, resolved.to, args);
                let outcome = pipeline::run(&self.definition, &mut self.current, ctx);
                let _ = self.state_tx.send(self.current.clone());
                outcome
            }
        };

        match reply {
            Some(reply) => {
                let _ = reply.send(outcome);
            }
            None => {
                if let FireOutcome::Failed(err) = outcome {
                    tracing::warn!(%err, "callback failed with no caller waiting");
                }
            }
        }
    }
}

/// Caller-facing handle to a running machine.
///
/// Cheap to clone; any number of tasks and threads may fire events through
/// their own clone concurrently. All firing modes feed one FIFO queue
/// processed by the machine's single worker.
#[derive(Clone)]
pub struct MachineHandle {
    definition: Arc<Definition>,
    event_tx: mpsc::Sender<FireRequest>,
    state_rx: watch::Receiver<StateName>,
    shutdown_tx: Arc<watch::Sender<Option<ShutdownMode>>>,
    dead: Arc<AtomicBool>,
}

impl MachineHandle {
    /// Fire an event and wait for its outcome.
    ///
    /// The call resolves once the machine has dequeued this event and run
    /// the full callback pipeline for it.
    pub async fn fire(&self, event: impl Into<EventName>) -> Result<FireOutcome, FireError> {
        self.fire_with(event, Vec::new()).await
    }

    /// Fire an event with arguments, visible to every callback through
    /// [`TransitionContext::args`].
    pub async fn fire_with(
        &self,
        event: impl Into<EventName>,
        args: Vec<Value>,
    ) -> Result<FireOutcome, FireError> {
        let event = self.admit(event.into())?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.event_tx
            .send(FireRequest {
                event,
                args,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| FireError::QueueDead)?;
        reply_rx.await.map_err(|_| FireError::QueueDead)
    }

    /// Fire an event from a non-async thread, blocking until its outcome.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// use [`fire`](Self::fire) there instead.
    pub fn fire_blocking(&self, event: impl Into<EventName>) -> Result<FireOutcome, FireError> {
        let event = self.admit(event.into())?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.event_tx
            .blocking_send(FireRequest {
                event,
                args: Vec::new(),
                reply: Some(reply_tx),
            })
            .map_err(|_| FireError::QueueDead)?;
        reply_rx.blocking_recv().map_err(|_| FireError::QueueDead)
    }

    /// Fire an event without waiting for its outcome.
    ///
    /// The call returns as soon as the event is enqueued; the outcome is
    /// observable only through callback side effects and the tracing sink.
    pub async fn fire_async(&self, event: impl Into<EventName>) -> Result<(), FireError> {
        self.fire_async_with(event, Vec::new()).await
    }

    /// Fire-and-forget with arguments.
    pub async fn fire_async_with(
        &self,
        event: impl Into<EventName>,
        args: Vec<Value>,
    ) -> Result<(), FireError> {
        let event = self.admit(event.into())?;
        self.event_tx
            .send(FireRequest {
                event,
                args,
                reply: None,
            })
            .await
            .map_err(|_| FireError::QueueDead)
    }

    /// Fire-and-forget without awaiting queue capacity.
    pub fn try_fire(&self, event: impl Into<EventName>) -> Result<(), FireError> {
        let event = self.admit(event.into())?;
        self.event_tx
            .try_send(FireRequest {
                event,
                args: Vec::new(),
                reply: None,
            })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => FireError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => FireError::QueueDead,
            })
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn current_state(&self) -> StateName {
        self.state_rx.borrow().clone()
    }

    /// Whether firing `event` from the current state would resolve to a
    /// transition. No side effects; `false` for undeclared event names.
    #[must_use]
    pub fn can_fire(&self, event: &str) -> bool {
        if !self.definition.has_event(event) {
            return false;
        }
        let current = self.state_rx.borrow().clone();
        resolver::resolve(&self.definition, &current, &EventName::from(event)).is_some()
    }

    /// Whether the machine currently occupies a terminal state.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        let current = self.state_rx.borrow().clone();
        self.definition.is_terminal(&current)
    }

    /// The machine's definition.
    #[must_use]
    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// Wait until the machine reaches `state`.
    ///
    /// Fails with [`FireError::InvalidState`] for undeclared names and with
    /// [`FireError::QueueDead`] if the machine stops first.
    pub async fn wait_for_state(&self, state: impl Into<StateName>) -> Result<(), FireError> {
        let state = state.into();
        if !state.is_none_state() && !self.definition.has_state(state.as_str()) {
            return Err(FireError::InvalidState(state));
        }
        let mut rx = self.state_rx.clone();
        while *rx.borrow_and_update() != state {
            rx.changed().await.map_err(|_| FireError::QueueDead)?;
        }
        Ok(())
    }

    /// Terminate the machine: the queue is marked dead, events already
    /// admitted are processed, then the worker stops.
    ///
    /// Every firing call made after this one fails with
    /// [`FireError::QueueDead`].
    pub fn terminate(&self) {
        self.dead.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(Some(ShutdownMode::Graceful));
    }

    /// Terminate without draining: unprocessed events are dropped, and
    /// their waiting callers observe [`FireError::QueueDead`].
    pub fn terminate_now(&self) {
        self.dead.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(Some(ShutdownMode::Immediate));
    }

    fn admit(&self, event: EventName) -> Result<EventName, FireError> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(FireError::QueueDead);
        }
        if !self.definition.has_event(event.as_str()) {
            return Err(FireError::InvalidEvent(event));
        }
        Ok(event)
    }
}

impl std::fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineHandle")
            .field("current_state", &self.current_state())
            .field("dead", &self.dead.load(Ordering::SeqCst))
            .finish()
    }
}

/// Owns the machine's worker task; resolves to the final state once the
/// worker stops.
#[derive(Debug)]
pub struct MachineTask {
    handle: JoinHandle<StateName>,
}

impl Future for MachineTask {
    type Output = Result<StateName, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}
