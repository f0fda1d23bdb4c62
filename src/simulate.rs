//! Scenario runner.
//!
//! Replays a scripted sequence of app events (navigation requests, the
//! surface becoming ready, entity loads) against a recording surface and a
//! scripted fetcher, and reports what the surface saw and when. Meant to run
//! on a paused Tokio clock so a scenario spanning seconds finishes instantly
//! with exact virtual timestamps.
//!
//! ```toml
//! [[step]]
//! at_ms = 0
//! action = "load"
//! entity_id = "order-42"
//! target = "OrderDetail"
//!
//! [[step]]
//! at_ms = 100
//! action = "ready"
//!
//! [fetch.order-42]
//! outcomes = ["fail", "fail", "ok"]
//! ```

use crate::config::NavflowConfig;
use crate::coordinator::Handoff;
use crate::error::{FetchError, SimulationError, SurfaceError};
use crate::fetcher::{Entity, EntityFetcher};
use crate::intent::{IntentKind, Params};
use crate::navigator::Navigator;
use crate::scheduler::TokioScheduler;
use crate::surface::DisplaySurface;
use async_trait::async_trait;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Virtual time a finished scenario may keep running to let loads and the
/// queue settle.
const SETTLE_LIMIT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Navigate,
    Reset,
    Ready,
    Clear,
    Load,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub at_ms: u64,
    pub action: Action,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Reset target for a deep-link load.
    #[serde(default)]
    pub landing: Option<String>,
    #[serde(default)]
    pub params: Option<Params>,
}

/// Scripted result of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    /// Transient failure.
    Fail,
    NotFound,
    /// Permanent failure.
    Error,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Ok => "ok",
            Outcome::Fail => "fail",
            Outcome::NotFound => "not_found",
            Outcome::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FetchScript {
    /// Outcomes of successive attempts. Attempts past the end succeed.
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub document: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SurfaceScript {
    /// Targets the surface refuses.
    #[serde(default)]
    pub reject: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub fetch: HashMap<String, FetchScript>,
    #[serde(default)]
    pub surface: SurfaceScript,
}

impl Scenario {
    pub fn from_toml_str(text: &str) -> Result<Self, SimulationError> {
        let scenario: Scenario = toml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, SimulationError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimulationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), SimulationError> {
        for (index, step) in self.steps.iter().enumerate() {
            let missing = |field: &str| SimulationError::InvalidStep {
                index,
                reason: format!("'{:?}' step needs '{}'", step.action, field),
            };
            match step.action {
                Action::Navigate | Action::Reset if step.target.is_none() => {
                    return Err(missing("target"))
                }
                Action::Load if step.entity_id.is_none() => return Err(missing("entity_id")),
                Action::Load if step.target.is_none() => return Err(missing("target")),
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The display surface was asked to run an intent.
    Surface {
        kind: IntentKind,
        target: String,
        entity_id: Option<String>,
        accepted: bool,
    },
    /// One fetcher call.
    Fetch {
        entity_id: String,
        attempt: u32,
        outcome: Outcome,
    },
    /// A load reached a terminal failure.
    LoadFailed { entity_id: String, error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    /// Virtual milliseconds since the scenario started.
    pub at_ms: u64,
    pub event: Event,
}

#[derive(Clone)]
struct Timeline {
    start: Instant,
    entries: Arc<Mutex<Vec<TimelineEntry>>>,
}

impl Timeline {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, event: Event) {
        let at_ms = Instant::now()
            .saturating_duration_since(self.start)
            .as_millis() as u64;
        self.entries.lock().push(TimelineEntry { at_ms, event });
    }

    fn instant_at(&self, at_ms: u64) -> Instant {
        self.start + Duration::from_millis(at_ms)
    }

    fn into_entries(self) -> Vec<TimelineEntry> {
        let entries = std::mem::take(&mut *self.entries.lock());
        entries
    }
}

struct SimulatedSurface {
    timeline: Timeline,
    reject: HashSet<String>,
}

impl SimulatedSurface {
    fn record(&self, kind: IntentKind, target: &str, params: &Params) -> Result<(), SurfaceError> {
        let accepted = !self.reject.contains(target);
        self.timeline.record(Event::Surface {
            kind,
            target: target.to_string(),
            entity_id: params["entityId"].as_str().map(str::to_string),
            accepted,
        });
        if accepted {
            Ok(())
        } else {
            Err(SurfaceError::UnknownTarget(target.to_string()))
        }
    }
}

impl DisplaySurface for SimulatedSurface {
    fn navigate_to(&self, target: &str, params: &Params) -> Result<(), SurfaceError> {
        self.record(IntentKind::Navigate, target, params)
    }

    fn reset_to(&self, target: &str, params: &Params) -> Result<(), SurfaceError> {
        self.record(IntentKind::Reset, target, params)
    }
}

struct ScriptedFetcher {
    timeline: Timeline,
    scripts: HashMap<String, FetchScript>,
    attempts: Mutex<HashMap<String, u32>>,
}

#[async_trait]
impl EntityFetcher for ScriptedFetcher {
    async fn fetch(&self, entity_id: &str) -> Result<Entity, FetchError> {
        let script = self.scripts.get(entity_id);
        if let Some(latency) = script.map(|s| s.latency_ms).filter(|ms| *ms > 0) {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let attempt = {
            let mut attempts = self.attempts.lock();
            let count = attempts.entry(entity_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let outcome = script
            .and_then(|s| s.outcomes.get(attempt as usize - 1).copied())
            .unwrap_or(Outcome::Ok);
        self.timeline.record(Event::Fetch {
            entity_id: entity_id.to_string(),
            attempt,
            outcome,
        });

        match outcome {
            Outcome::Ok => {
                let document = script
                    .and_then(|s| s.document.clone())
                    .unwrap_or_else(|| json!({ "id": entity_id }));
                Ok(Entity::new(entity_id, document))
            }
            Outcome::Fail => Err(FetchError::Transient(format!(
                "scripted failure on attempt {}",
                attempt
            ))),
            Outcome::NotFound => Err(FetchError::NotFound(entity_id.to_string())),
            Outcome::Error => Err(FetchError::Permanent("scripted permanent failure".to_string())),
        }
    }
}

/// Run `scenario` to completion and return everything that happened, in order.
///
/// Must be called inside a Tokio runtime; with a paused clock the result is
/// fully deterministic.
pub async fn run(scenario: &Scenario, config: &NavflowConfig) -> Vec<TimelineEntry> {
    let timeline = Timeline::new();
    let surface = Arc::new(SimulatedSurface {
        timeline: timeline.clone(),
        reject: scenario.surface.reject.iter().cloned().collect(),
    });
    let fetcher = Arc::new(ScriptedFetcher {
        timeline: timeline.clone(),
        scripts: scenario.fetch.clone(),
        attempts: Mutex::new(HashMap::new()),
    });
    let navigator = Navigator::new(
        surface,
        fetcher,
        Arc::new(TokioScheduler::current()),
        config,
    );

    let mut steps: Vec<&Step> = scenario.steps.iter().collect();
    steps.sort_by_key(|s| s.at_ms);
    info!(steps = steps.len(), "Running scenario");

    for step in steps {
        tokio::time::sleep_until(timeline.instant_at(step.at_ms)).await;
        apply(&navigator, &timeline, step);
    }

    settle(&navigator, config).await;
    timeline.into_entries()
}

fn apply(navigator: &Navigator, timeline: &Timeline, step: &Step) {
    debug!(at_ms = step.at_ms, action = ?step.action, "Applying scenario step");
    let target = step.target.clone().unwrap_or_default();
    let params = step.params.clone().unwrap_or_else(|| json!({}));
    match step.action {
        Action::Navigate => {
            navigator.enqueue_navigate(target, params);
        }
        Action::Reset => {
            navigator.enqueue_reset(target, params);
        }
        Action::Ready => navigator.set_ready(),
        Action::Clear => {
            navigator.clear_queue();
        }
        Action::Load => {
            let entity_id = step.entity_id.clone().unwrap_or_default();
            let handoff = match &step.landing {
                Some(landing) => Handoff::deep_link(landing.clone(), target),
                None => Handoff::navigate(target),
            };
            let failures = timeline.clone();
            let failed_id = entity_id.clone();
            navigator.load_and_handoff(&entity_id, handoff, move |err| {
                failures.record(Event::LoadFailed {
                    entity_id: failed_id,
                    error: err.to_string(),
                });
            });
        }
    }
}

/// Keep the clock moving until no load is in flight and the queue has nothing
/// left it could run.
async fn settle(navigator: &Navigator, config: &NavflowConfig) {
    let tick = config.queue.min_interval();
    let deadline = Instant::now() + SETTLE_LIMIT;
    loop {
        let queue = navigator.queue().stats();
        let loads = navigator.coordinator().stats();
        let queue_idle = queue.pending == 0 || !navigator.queue().is_ready();
        if loads.in_flight == 0 && queue_idle && queue.executing == 0 {
            break;
        }
        if Instant::now() >= deadline {
            info!(
                pending = queue.pending,
                in_flight = loads.in_flight,
                "Scenario did not settle"
            );
            break;
        }
        tokio::time::sleep(tick).await;
    }
}

/// Render a timeline as a table.
pub fn format_timeline(entries: &[TimelineEntry]) -> String {
    let mut out = format!("{}\n\n", "Timeline".bold().underline());
    if entries.is_empty() {
        out.push_str("Nothing happened.\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["t (ms)", "Event", "Subject", "Result"]);
    for entry in entries {
        let (event, subject, result) = match &entry.event {
            Event::Surface {
                kind,
                target,
                entity_id,
                accepted,
            } => {
                let subject = match entity_id {
                    Some(id) => format!("{} ({})", target, id),
                    None => target.clone(),
                };
                let result = if *accepted {
                    "ok".green().to_string()
                } else {
                    "rejected".red().to_string()
                };
                (kind.to_string(), subject, result)
            }
            Event::Fetch {
                entity_id,
                attempt,
                outcome,
            } => {
                let result = match outcome {
                    Outcome::Ok => outcome.green().to_string(),
                    Outcome::Fail => outcome.yellow().to_string(),
                    _ => outcome.red().to_string(),
                };
                (format!("fetch #{}", attempt), entity_id.clone(), result)
            }
            Event::LoadFailed { entity_id, error } => (
                "load failed".to_string(),
                entity_id.clone(),
                error.red().to_string(),
            ),
        };
        table.add_row(vec![entry.at_ms.to_string(), event, subject, result]);
    }
    out.push_str(&format!("{}\n", table));
    out
}
