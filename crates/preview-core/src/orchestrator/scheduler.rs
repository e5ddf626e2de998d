//! Debounced update scheduling
//!
//! `SchedulerCore` is the timing state machine and takes explicit instants.
//! `PreviewScheduler` runs it on its own thread, owns the orchestrator and
//! hands each batch to a short-lived worker so the loop keeps accepting
//! commands while a request is in flight.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::{PendingBatch, PreviewEvent, PreviewOrchestrator, VisibleItem};
use crate::error::{PreviewError, PreviewResult};
use crate::font::entity::FontEntity;
use crate::helper::wire::PreviewResponse;
use crate::traits::PreviewService;

/// How soon a requested update should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Coalesce with other requests inside the debounce window
    Debounced,
    /// Run on the next loop turn
    Immediate,
}

/// Debounce deadline plus the busy and rerun flags
#[derive(Debug, Clone)]
pub struct SchedulerCore {
    debounce: Duration,
    deadline: Option<Instant>,
    busy: bool,
    rerun: bool,
}

impl SchedulerCore {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
            busy: false,
            rerun: false,
        }
    }

    /// Ask for an update.
    ///
    /// A debounced request restarts the window. An immediate request never
    /// pushes an earlier deadline back.
    pub fn request(&mut self, now: Instant, urgency: Urgency) {
        self.deadline = Some(match (urgency, self.deadline) {
            (Urgency::Immediate, Some(existing)) => existing.min(now),
            (Urgency::Immediate, None) => now,
            (Urgency::Debounced, _) => now + self.debounce,
        });
    }

    /// Time left until the pending deadline, if any
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Consume a due deadline; `true` means start a cycle now.
    ///
    /// A deadline reached while a batch is in flight is remembered as one
    /// rerun for when that batch finishes.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                if self.busy {
                    self.rerun = true;
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn mark_started(&mut self) {
        self.busy = true;
    }

    /// Clear the busy flag and schedule the remembered rerun
    pub fn mark_finished(&mut self, now: Instant) {
        self.busy = false;
        if std::mem::take(&mut self.rerun) {
            self.request(now, Urgency::Debounced);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Inputs accepted by the scheduler loop
pub enum PreviewCommand {
    SetVisible(Vec<VisibleItem>),
    SetText(String),
    SetSize(u32),
    ReplaceFonts(Vec<FontEntity>),
    SetService(Option<Arc<dyn PreviewService>>),
    /// Run an update without waiting for the debounce window
    Flush,
    BatchFinished {
        batch: PendingBatch,
        result: PreviewResult<Vec<PreviewResponse>>,
    },
    Shutdown,
}

/// Runs a `PreviewOrchestrator` on a background thread
pub struct PreviewScheduler {
    commands: mpsc::Sender<PreviewCommand>,
    events: async_channel::Receiver<PreviewEvent>,
    thread: Option<JoinHandle<PreviewOrchestrator>>,
}

impl PreviewScheduler {
    /// Spawn with the orchestrator's configured debounce window
    pub fn start(orchestrator: PreviewOrchestrator) -> PreviewResult<Self> {
        let debounce = orchestrator.config().debounce();
        Self::spawn(orchestrator, debounce)
    }

    pub fn spawn(mut orchestrator: PreviewOrchestrator, debounce: Duration) -> PreviewResult<Self> {
        let events = orchestrator.subscribe();
        let (commands, rx) = mpsc::channel();
        let loopback = commands.clone();
        let thread = thread::Builder::new()
            .name("preview-scheduler".to_string())
            .spawn(move || run_loop(orchestrator, SchedulerCore::new(debounce), rx, loopback))?;
        info!("Preview scheduler started with {:?} debounce", debounce);
        Ok(Self {
            commands,
            events,
            thread: Some(thread),
        })
    }

    /// Queue a command; `false` once the loop has stopped
    pub fn send(&self, command: PreviewCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(_) => {
                warn!("Preview scheduler is no longer running");
                false
            }
        }
    }

    pub fn set_visible_items(&self, items: Vec<VisibleItem>) -> bool {
        self.send(PreviewCommand::SetVisible(items))
    }

    pub fn set_preview_text(&self, text: &str) -> bool {
        self.send(PreviewCommand::SetText(text.to_string()))
    }

    pub fn set_font_size(&self, size: u32) -> bool {
        self.send(PreviewCommand::SetSize(size))
    }

    pub fn replace_fonts(&self, entities: Vec<FontEntity>) -> bool {
        self.send(PreviewCommand::ReplaceFonts(entities))
    }

    pub fn set_service(&self, service: Option<Arc<dyn PreviewService>>) -> bool {
        self.send(PreviewCommand::SetService(service))
    }

    pub fn flush(&self) -> bool {
        self.send(PreviewCommand::Flush)
    }

    /// A sender for other threads
    pub fn handle(&self) -> mpsc::Sender<PreviewCommand> {
        self.commands.clone()
    }

    pub fn events(&self) -> async_channel::Receiver<PreviewEvent> {
        self.events.clone()
    }

    /// Stop the loop and take the orchestrator back
    pub fn shutdown(mut self) -> Option<PreviewOrchestrator> {
        self.stop_loop()
    }

    fn stop_loop(&mut self) -> Option<PreviewOrchestrator> {
        let thread = self.thread.take()?;
        let _ = self.commands.send(PreviewCommand::Shutdown);
        match thread.join() {
            Ok(orchestrator) => Some(orchestrator),
            Err(_) => {
                warn!("Preview scheduler thread panicked");
                None
            }
        }
    }
}

impl Drop for PreviewScheduler {
    fn drop(&mut self) {
        self.stop_loop();
    }
}

fn run_loop(
    mut orchestrator: PreviewOrchestrator,
    mut core: SchedulerCore,
    commands: mpsc::Receiver<PreviewCommand>,
    loopback: mpsc::Sender<PreviewCommand>,
) -> PreviewOrchestrator {
    loop {
        if core.poll(Instant::now()) {
            dispatch(&mut orchestrator, &mut core, &loopback);
        }

        let command = match core.timeout(Instant::now()) {
            Some(wait) => match commands.recv_timeout(wait) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        let now = Instant::now();
        match command {
            PreviewCommand::SetVisible(items) => {
                let urgency = if orchestrator.set_visible_items(items) {
                    Urgency::Immediate
                } else {
                    Urgency::Debounced
                };
                core.request(now, urgency);
            }
            PreviewCommand::SetText(text) => {
                orchestrator.set_preview_text(&text);
                core.request(now, Urgency::Debounced);
            }
            PreviewCommand::SetSize(size) => {
                orchestrator.set_font_size(size);
                core.request(now, Urgency::Debounced);
            }
            PreviewCommand::ReplaceFonts(entities) => {
                orchestrator.replace_fonts(entities);
            }
            PreviewCommand::SetService(service) => {
                orchestrator.set_service(service);
                core.request(now, Urgency::Immediate);
            }
            PreviewCommand::Flush => core.request(now, Urgency::Immediate),
            PreviewCommand::BatchFinished { batch, result } => {
                orchestrator.complete_cycle(batch, result);
                core.mark_finished(now);
            }
            PreviewCommand::Shutdown => break,
        }
    }
    debug!("Preview scheduler loop exiting");
    orchestrator
}

fn dispatch(
    orchestrator: &mut PreviewOrchestrator,
    core: &mut SchedulerCore,
    loopback: &mpsc::Sender<PreviewCommand>,
) {
    let Some(batch) = orchestrator.begin_cycle() else {
        trace!("Nothing to request");
        return;
    };
    let Some(service) = orchestrator.service() else {
        orchestrator.complete_cycle(batch, Err(PreviewError::HelperNotRunning));
        return;
    };

    core.mark_started();
    let tx = loopback.clone();
    let (worker_batch, requests) = (batch.clone(), batch.requests.len());
    let spawned = thread::Builder::new()
        .name("preview-batch".to_string())
        .spawn(move || {
            let result = service.fetch_batch(&worker_batch.requests, &worker_batch.text, worker_batch.size);
            if tx
                .send(PreviewCommand::BatchFinished {
                    batch: worker_batch,
                    result,
                })
                .is_err()
            {
                trace!("Scheduler gone before batch finished");
            }
        });

    match spawned {
        Ok(_) => trace!("Dispatched batch of {} requests", requests),
        Err(e) => {
            warn!("Failed to spawn batch worker: {}", e);
            orchestrator.complete_cycle(batch, Err(PreviewError::from(e)));
            core.mark_finished(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreviewConfig;
    use crate::dummy_backend::DummyPreviewService;
    use crate::font::entity::HostFont;
    use crate::store::FontStore;

    fn wait_for(
        events: &async_channel::Receiver<PreviewEvent>,
        timeout: Duration,
        mut pred: impl FnMut(&PreviewEvent) -> bool,
    ) -> bool {
        let started = Instant::now();
        while started.elapsed() < timeout {
            match events.try_recv() {
                Ok(event) if pred(&event) => return true,
                Ok(_) => {}
                Err(_) => thread::sleep(Duration::from_millis(5)),
            }
        }
        false
    }

    fn scheduler_with(service: Arc<DummyPreviewService>, debounce: Duration) -> PreviewScheduler {
        let mut entity = FontEntity::from_host(
            &HostFont {
                name: Some("Pretendard".to_string()),
                post_script_name: Some("Pretendard-Regular".to_string()),
                ..HostFont::default()
            },
            0,
        );
        entity.requires_external_render = true;
        let mut store = FontStore::new();
        store.replace_all(vec![entity]);
        let orchestrator =
            PreviewOrchestrator::new(PreviewConfig::default(), store).with_service(service);
        PreviewScheduler::spawn(orchestrator, debounce).unwrap()
    }

    #[test]
    fn test_start_uses_configured_debounce() {
        let config = PreviewConfig::default().with_debounce(5);
        let orchestrator = PreviewOrchestrator::new(config, FontStore::new());
        let scheduler = PreviewScheduler::start(orchestrator).unwrap();
        assert!(scheduler.set_font_size(30));
        let orchestrator = scheduler.shutdown().unwrap();
        assert_eq!(orchestrator.size(), 30);
    }

    #[test]
    fn test_debounced_request_coalesces() {
        let start = Instant::now();
        let mut core = SchedulerCore::new(Duration::from_millis(100));
        core.request(start, Urgency::Debounced);
        core.request(start + Duration::from_millis(50), Urgency::Debounced);

        assert!(!core.poll(start + Duration::from_millis(120)));
        assert_eq!(
            core.timeout(start + Duration::from_millis(120)),
            Some(Duration::from_millis(30))
        );
        assert!(core.poll(start + Duration::from_millis(150)));
        assert!(!core.is_pending());
    }

    #[test]
    fn test_immediate_request_not_delayed() {
        let start = Instant::now();
        let mut core = SchedulerCore::new(Duration::from_millis(100));
        core.request(start, Urgency::Immediate);
        core.request(start + Duration::from_millis(10), Urgency::Immediate);
        assert_eq!(core.timeout(start + Duration::from_millis(10)), Some(Duration::ZERO));
        assert!(core.poll(start + Duration::from_millis(10)));
    }

    #[test]
    fn test_tick_while_busy_reruns_once() {
        let start = Instant::now();
        let mut core = SchedulerCore::new(Duration::from_millis(100));
        core.mark_started();
        core.request(start, Urgency::Immediate);
        core.request(start, Urgency::Immediate);
        assert!(!core.poll(start));
        assert!(core.is_busy());

        let finished = start + Duration::from_millis(10);
        core.mark_finished(finished);
        assert!(!core.is_busy());
        assert_eq!(core.timeout(finished), Some(Duration::from_millis(100)));
        assert!(core.poll(finished + Duration::from_millis(100)));

        core.mark_finished(finished + Duration::from_millis(200));
        assert!(!core.is_pending());
    }

    #[test]
    fn test_scheduler_renders_visible_font() {
        let service = Arc::new(DummyPreviewService::new());
        let scheduler = scheduler_with(service.clone(), Duration::from_millis(20));
        let events = scheduler.events();

        assert!(scheduler.set_visible_items(vec![VisibleItem::new("font-0", 240)]));
        assert!(wait_for(&events, Duration::from_secs(5), |event| {
            matches!(event, PreviewEvent::ImageReady { uid, .. } if uid == "font-0")
        }));

        let orchestrator = scheduler.shutdown().unwrap();
        assert!(orchestrator.store().get("font-0").unwrap().last_image.is_some());
        assert_eq!(service.call_count(), 1);
    }

    #[test]
    fn test_scheduler_reruns_after_busy_batch() {
        let service = Arc::new(DummyPreviewService::new().with_delay(Duration::from_millis(150)));
        let scheduler = scheduler_with(service.clone(), Duration::from_millis(10));
        let events = scheduler.events();

        scheduler.set_visible_items(vec![VisibleItem::new("font-0", 240)]);
        thread::sleep(Duration::from_millis(50));
        scheduler.set_font_size(40);

        let mut finished = 0;
        assert!(wait_for(&events, Duration::from_secs(5), |event| {
            if matches!(event, PreviewEvent::CycleFinished(_)) {
                finished += 1;
            }
            finished == 2
        }));
        let calls = service.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].size, 40);
        drop(scheduler);
    }
}
