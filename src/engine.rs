//! Background engine driving a review session with progress events

use std::thread::JoinHandle;
use std::time::Duration;

use async_channel as channel;
use async_channel::TryRecvError;
use futures_lite::future;
use tracing::{debug, info, warn};

use crate::decision::DuplicatePairDecision;
use crate::error::{DupError, DupResult};
use crate::media_pairs::MediaResultPair;
use crate::session::{CommitSummary, ReviewSession, StepOutcome};

#[derive(Debug, Clone)]
pub enum EngineCommand {
    Start,
    Pause,
    SetIdle(bool),
    /// Drop the current batch and search again
    FetchMore,
    Commit(Vec<DuplicatePairDecision>),
    Stop,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Started,
    Status(String),
    BatchReady(Vec<MediaResultPair>),
    Committed(CommitSummary),
    Exhausted,
    Error(String),
    Completed,
}

pub struct ReviewEngine {
    cmd_tx: channel::Sender<EngineCommand>,
    evt_rx: channel::Receiver<EngineEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ReviewEngine {
    pub fn start(mut session: ReviewSession) -> Self {
        let (cmd_tx, cmd_rx) = channel::unbounded::<EngineCommand>();
        let (evt_tx, evt_rx) = channel::unbounded::<EngineEvent>();

        // One thread owns the session; the factory is single-writer
        let handle = std::thread::spawn(move || {
            future::block_on(async move {
                info!("Engine: started");
                let mut running = false;
                // A batch is out for decisions; no search until it comes back
                let mut awaiting_decisions = false;
                let mut exhausted = false;

                let _ = evt_tx.send(EngineEvent::Started).await;
                'engine: loop {
                    loop {
                        let cmd = match cmd_rx.try_recv() {
                            Ok(cmd) => cmd,
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Closed) => break 'engine,
                        };
                        match cmd {
                            EngineCommand::Start => running = true,
                            EngineCommand::Pause => running = false,
                            EngineCommand::SetIdle(idle) => session.notify_idle_state(idle),
                            EngineCommand::FetchMore => {
                                session.fetch_more();
                                awaiting_decisions = false;
                                exhausted = false;
                            }
                            EngineCommand::Commit(decisions) => {
                                let event = match session.commit(decisions) {
                                    Ok(summary) => EngineEvent::Committed(summary),
                                    Err(e) => EngineEvent::Error(e.to_string()),
                                };
                                let _ = evt_tx.send(event).await;
                                awaiting_decisions = false;
                                exhausted = false;
                            }
                            EngineCommand::Stop => break 'engine,
                        }
                    }

                    if running && !awaiting_decisions && !exhausted {
                        match session.step() {
                            Ok(StepOutcome::Ready { pairs }) => {
                                debug!("Engine: batch of {} pairs ready", pairs);
                                let event = match session.media_result_pairs() {
                                    Ok(batch) => {
                                        awaiting_decisions = true;
                                        EngineEvent::BatchReady(batch.iter().cloned().collect())
                                    }
                                    Err(e) => {
                                        running = false;
                                        EngineEvent::Error(e.to_string())
                                    }
                                };
                                let _ = evt_tx.send(event).await;
                            }
                            Ok(StepOutcome::Exhausted) => {
                                info!("Engine: no pairs left to review");
                                let _ = evt_tx.send(EngineEvent::Exhausted).await;
                                exhausted = true;
                            }
                            Ok(_) => {
                                let _ = evt_tx.send(EngineEvent::Status(session.work_status())).await;
                            }
                            Err(e) => {
                                warn!("Engine: step failed: {}", e);
                                let _ = evt_tx.send(EngineEvent::Error(e.to_string())).await;
                                running = false;
                            }
                        }
                        future::yield_now().await;
                    } else {
                        smol::Timer::after(Duration::from_millis(50)).await;
                    }
                }
                info!("Engine: stopped");
                let _ = evt_tx.send(EngineEvent::Completed).await;
            });
        });

        Self {
            cmd_tx,
            evt_rx,
            handle: Some(handle),
        }
    }

    pub fn send(&self, cmd: EngineCommand) -> DupResult<()> {
        self.cmd_tx
            .send_blocking(cmd)
            .map_err(|e| DupError::Channel(e.to_string()))
    }

    pub fn events(&self) -> &channel::Receiver<EngineEvent> {
        &self.evt_rx
    }

    /// Block until the next event
    pub fn recv(&self) -> DupResult<EngineEvent> {
        self.evt_rx
            .recv_blocking()
            .map_err(|e| DupError::Channel(e.to_string()))
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(mut self) -> DupResult<()> {
        let _ = self.cmd_tx.send_blocking(EngineCommand::Stop);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| DupError::Channel("engine thread panicked".to_string()))?;
        }
        Ok(())
    }
}
