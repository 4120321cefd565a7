//! Resilient Controller
//!
//! Entry point of the dispatcher. One request runs through:
//!
//! 1. input check (blank input touches no engine)
//! 2. candidate matching, split by engine health
//! 3. the primary engine picked by the selector, gated by its breaker
//! 4. the fallback chain when the primary did not succeed:
//!    healthy sweep, degraded sweep, pattern extraction, naive positional
//!
//! Every engine call updates the engine's health entry and its breaker.
//! Engine failures never escape: the caller always gets an [`EngineResult`].

use crate::config::{ConfigError, ControllerConfig};
use crate::fallback::{self, FallbackStrategy, NAIVE_CONFIDENCE, PATTERN_CONFIDENCE};
use crate::stats::{ProcessingStats, StatsSnapshot};
use dispatch_core::{
    normalize_confidence, panic_message, DispatchError, EngineCategory, EngineError, EngineId,
    EngineOutput, EngineResult, GrammarEngine, RequestContext, SharedEngine, SlotMap,
    CONTROLLER_VERSION,
};
use dispatch_health::{BreakerSnapshot, CircuitBreaker, EngineHealthStatus, HealthMonitor, HealthState};
use dispatch_registry::{find_candidates, select, Candidate, EngineInfo, EngineRegistry, RegistryError};
use grammar_engines::normalizer::is_blank;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Engine id reported when no engine or fallback produced the result.
pub const NO_ENGINE: &str = "none";

#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Health entry plus breaker view for one engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineHealthReport {
    #[serde(flatten)]
    pub health: EngineHealthStatus,
    pub breaker: BreakerSnapshot,
}

/// Process-wide dispatcher state shared by all requests.
pub struct ControllerState {
    registry: EngineRegistry,
    health: HealthMonitor,
    breakers: HashMap<EngineId, CircuitBreaker>,
    stats: ProcessingStats,
    config: ControllerConfig,
}

/// Cheap to clone; clones share one [`ControllerState`].
#[derive(Clone)]
pub struct ResilientController {
    state: Arc<ControllerState>,
}

impl ResilientController {
    pub fn new(registry: EngineRegistry, config: ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        for id in config.engines.keys() {
            if registry.get(&EngineId::from(id.as_str())).is_none() {
                warn!(engine = %id, "breaker override for unregistered engine");
            }
        }

        let health = HealthMonitor::new(registry.ids(), config.health.clone());
        let breakers = registry
            .ids()
            .map(|id| (id.clone(), CircuitBreaker::new(id.clone(), &config.breaker_for(id))))
            .collect();

        info!(
            engines = registry.len(),
            timeout_ms = ?config.engine_timeout_ms,
            "controller ready"
        );

        Ok(Self {
            state: Arc::new(ControllerState {
                registry,
                health,
                breakers,
                stats: ProcessingStats::new(),
                config,
            }),
        })
    }

    /// Controller over the built-in grammar engines.
    pub fn with_builtin_engines(config: ControllerConfig) -> Result<Self, SetupError> {
        let mut registry = EngineRegistry::new();
        grammar_engines::register_builtin_engines(&mut registry)?;
        Ok(Self::new(registry, config)?)
    }

    /// Route `sentence` to an engine and return a normalized result.
    ///
    /// With `debug` set, metadata also carries the candidates, the primary
    /// engine and every attempt made.
    pub fn process_sentence(&self, sentence: &str, debug: bool) -> EngineResult {
        let started = Instant::now();
        self.state.stats.request();

        let mut dispatch = Dispatch::new(&self.state, sentence, RequestContext::new(debug));
        let result = dispatch.run();
        dispatch.finish(result, started)
    }

    pub fn get_engine_info(&self) -> EngineInfo {
        self.state.registry.info()
    }

    pub fn get_processing_stats(&self) -> StatsSnapshot {
        self.state
            .stats
            .snapshot(self.state.health.successful_recoveries())
    }

    /// Health and breaker state of every engine, ordered by engine id.
    pub fn get_health_report(&self) -> Vec<EngineHealthReport> {
        self.state
            .health
            .snapshot()
            .into_iter()
            .filter_map(|health| {
                let breaker = self.state.breakers.get(&health.engine)?.snapshot();
                Some(EngineHealthReport { health, breaker })
            })
            .collect()
    }

    /// Operator override: engine back to Healthy with a closed breaker.
    ///
    /// Returns `false` for an unknown engine.
    pub fn reset_engine(&self, id: &EngineId) -> bool {
        let Some(breaker) = self.state.breakers.get(id) else {
            return false;
        };
        breaker.reset();
        self.state.health.reset(id);
        info!(engine = %id, "engine reset");
        true
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.state.config
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.state.registry
    }
}

impl ControllerState {
    /// Split candidates into (Healthy/Recovering, Degraded/Failing).
    ///
    /// Failed engines are dropped unless their cool-down has passed, in which
    /// case they move to Recovering and join the first group.
    fn partition(&self, candidates: &[Candidate]) -> (Vec<Candidate>, Vec<Candidate>) {
        let mut preferred = Vec::new();
        let mut degraded = Vec::new();

        for candidate in candidates {
            match self.health.state(&candidate.id) {
                Some(HealthState::Failed) => {
                    let cooldown = self.config.breaker_for(&candidate.id).recovery_timeout();
                    if self.health.try_begin_recovery(&candidate.id, cooldown) {
                        preferred.push(candidate.clone());
                    }
                }
                Some(state) if !state.is_preferred() => degraded.push(candidate.clone()),
                _ => preferred.push(candidate.clone()),
            }
        }
        (preferred, degraded)
    }

    /// Candidates not tried yet, best health score first.
    fn sweep_order(&self, pool: &[Candidate], considered: &[EngineId]) -> Vec<Candidate> {
        let mut remaining: Vec<(f64, Candidate)> = pool
            .iter()
            .filter(|c| !considered.contains(&c.id))
            .map(|c| (self.health.health_score(&c.id), c.clone()))
            .collect();
        // Stable: equal scores keep priority order
        remaining.sort_by(|a, b| b.0.total_cmp(&a.0));
        remaining.into_iter().map(|(_, c)| c).collect()
    }

    fn invoke(&self, id: &EngineId, engine: SharedEngine, sentence: &str) -> Result<EngineOutput, EngineError> {
        let Some(timeout) = self.config.engine_timeout() else {
            return guarded_process(engine.as_ref(), sentence);
        };

        // The worker owns everything it touches; a late answer is dropped
        // with the channel.
        let (tx, rx) = mpsc::channel();
        let owned = sentence.to_string();
        thread::Builder::new()
            .name(format!("engine-{}", id))
            .spawn(move || {
                let _ = tx.send(guarded_process(engine.as_ref(), &owned));
            })
            .map_err(|e| EngineError::Runtime(format!("cannot start engine worker: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                warn!(engine = %id, timeout_ms = timeout.as_millis() as u64, "engine call timed out");
                Err(EngineError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Panicked(
                "engine worker exited without answering".to_string(),
            )),
        }
    }
}

fn guarded_process(engine: &dyn GrammarEngine, sentence: &str) -> Result<EngineOutput, EngineError> {
    catch_unwind(AssertUnwindSafe(|| engine.process(sentence)))
        .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(payload.as_ref()))))
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// One entry of the debug attempt trail.
#[derive(Debug, Clone, Serialize)]
struct Attempt {
    engine: EngineId,
    outcome: &'static str,
    elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Per-request bookkeeping.
struct Dispatch<'a> {
    state: &'a ControllerState,
    sentence: &'a str,
    ctx: RequestContext,
    candidates: Vec<Candidate>,
    primary: Option<EngineId>,
    /// Engines already considered this request, tried or skipped
    considered: Vec<EngineId>,
    /// Engines that ran (or failed to load) and failed
    failed: Vec<String>,
    last_failed: Option<EngineCategory>,
    attempts: Vec<Attempt>,
    degradation_counted: bool,
}

impl<'a> Dispatch<'a> {
    fn new(state: &'a ControllerState, sentence: &'a str, ctx: RequestContext) -> Self {
        Self {
            state,
            sentence,
            ctx,
            candidates: Vec::new(),
            primary: None,
            considered: Vec::new(),
            failed: Vec::new(),
            last_failed: None,
            attempts: Vec::new(),
            degradation_counted: false,
        }
    }

    fn run(&mut self) -> EngineResult {
        if is_blank(self.sentence) {
            debug!(trace_id = %self.ctx.trace_id, "rejecting blank input");
            return EngineResult::failure(EngineId::from(NO_ENGINE), DispatchError::EmptyInput.to_string());
        }

        self.candidates = find_candidates(&self.state.registry, self.sentence);
        if self.candidates.is_empty() {
            debug!(trace_id = %self.ctx.trace_id, "no applicable engine");
            self.state.stats.fallback();
            return self.positional_fallback(DispatchError::NoApplicableEngine);
        }

        // Category hint for pattern extraction if no engine gets to run
        self.last_failed = select(self.sentence, &self.candidates)
            .and_then(|id| self.candidates.iter().find(|c| c.id == id))
            .map(|c| c.category);

        let (preferred, degraded) = self.state.partition(&self.candidates);
        let pool = if preferred.is_empty() && !degraded.is_empty() {
            self.graceful_degradation();
            &degraded
        } else {
            &preferred
        };

        if let Some(primary) = select(self.sentence, pool) {
            self.primary = Some(primary.clone());
            if let Some(candidate) = pool.iter().find(|c| c.id == primary).cloned() {
                if let Some(result) = self.attempt(&candidate) {
                    return result;
                }
            }
        }

        self.state.stats.fallback();
        info!(
            trace_id = %self.ctx.trace_id,
            primary = ?self.primary.as_ref().map(|p| p.as_str()),
            "primary engine failed, entering fallback chain"
        );

        for candidate in self.state.sweep_order(&preferred, &self.considered) {
            if let Some(result) = self.attempt(&candidate) {
                return self.fallback_success(result, FallbackStrategy::HealthySweep);
            }
        }

        let degraded_sweep = self.state.sweep_order(&degraded, &self.considered);
        if !degraded_sweep.is_empty() {
            self.graceful_degradation();
        }
        for candidate in degraded_sweep {
            if let Some(result) = self.attempt(&candidate) {
                return self.fallback_success(result, FallbackStrategy::DegradedSweep);
            }
        }

        if let Some(category) = self.last_failed {
            if let Some(slots) = fallback::pattern_extract(self.sentence, category) {
                let result = fallback_result(FallbackStrategy::PatternExtraction, slots, PATTERN_CONFIDENCE);
                return self.fallback_success(result, FallbackStrategy::PatternExtraction);
            }
        }

        self.positional_fallback(DispatchError::AllEnginesExhausted {
            attempted: self.failed.clone(),
        })
    }

    /// Steps 4 and 5 of the chain: naive split, else terminal failure.
    fn positional_fallback(&mut self, cause: DispatchError) -> EngineResult {
        match fallback::naive_extract(self.sentence) {
            Some(slots) => {
                let result = fallback_result(FallbackStrategy::NaivePositional, slots, NAIVE_CONFIDENCE);
                self.fallback_success(result, FallbackStrategy::NaivePositional)
            }
            None => {
                warn!(trace_id = %self.ctx.trace_id, error = %cause, "all fallbacks exhausted");
                EngineResult::failure(
                    EngineId::from(NO_ENGINE),
                    format!("{}; fallback extraction found no slots", cause),
                )
            }
        }
    }

    fn graceful_degradation(&mut self) {
        if !self.degradation_counted {
            self.degradation_counted = true;
            self.state.stats.graceful_degradation();
            info!(trace_id = %self.ctx.trace_id, "serving from degraded engines");
        }
    }

    fn fallback_success(&self, mut result: EngineResult, strategy: FallbackStrategy) -> EngineResult {
        self.state.stats.partial_success();
        debug!(
            trace_id = %self.ctx.trace_id,
            strategy = strategy.as_str(),
            engine = %result.engine,
            "fallback produced slots"
        );
        result
            .metadata
            .insert("fallback_strategy".to_string(), json!(strategy.as_str()));
        result
    }

    /// Run one engine through breaker, loader and invocation.
    fn attempt(&mut self, candidate: &Candidate) -> Option<EngineResult> {
        let state = self.state;
        let id = &candidate.id;
        let started = Instant::now();
        self.considered.push(id.clone());

        let breaker = state.breakers.get(id)?;
        if !breaker.can_execute() {
            debug!(engine = %id, "breaker open, skipping engine");
            self.trail(id, "breaker_open", started, None);
            return None;
        }

        let engine = match state.registry.ensure_loaded(id) {
            Ok(engine) => engine,
            Err(err) => {
                self.fail(candidate, breaker, &err.engine_error(), started);
                return None;
            }
        };

        if engine.is_applicable(self.sentence) == Some(false) {
            debug!(engine = %id, "engine declined sentence");
            self.trail(id, "not_applicable", started, None);
            return None;
        }

        state.registry.record_usage(id);
        // Load time stays out of the latency sample
        let invoked = Instant::now();
        let outcome = state.invoke(id, engine, self.sentence);
        let elapsed = invoked.elapsed();
        state.health.record_latency(id, elapsed);

        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                self.fail(candidate, breaker, &err, started);
                return None;
            }
        };

        let (slots, extra) = output.slots.partition_known();
        if !output.success || slots.is_empty() {
            let reason = output
                .error
                .unwrap_or_else(|| "engine returned no slots".to_string());
            self.fail(candidate, breaker, &EngineError::Runtime(reason), started);
            return None;
        }

        state.health.record_success(id);
        breaker.record_success();
        self.trail(id, "success", started, None);
        debug!(engine = %id, elapsed_ms = ms(elapsed), slots = slots.len(), "engine succeeded");

        let mut metadata = output.metadata;
        if !extra.is_empty() {
            let extra: Map<String, Value> = extra
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect();
            metadata.insert("extra_slots".to_string(), Value::Object(extra));
        }

        Some(EngineResult {
            engine: id.clone(),
            confidence: normalize_confidence(&slots),
            slots,
            metadata,
            success: true,
            processing_time: elapsed,
            error: None,
        })
    }

    fn fail(&mut self, candidate: &Candidate, breaker: &CircuitBreaker, err: &EngineError, started: Instant) {
        let id = &candidate.id;
        let reason = err.to_string();

        self.state.health.record_failure(id, &reason);
        if breaker.record_failure() {
            self.state.stats.breaker_trip();
        }

        let classified = DispatchError::from_engine(id.as_str(), err);
        debug!(trace_id = %self.ctx.trace_id, error = %classified, "engine attempt failed");

        self.last_failed = Some(candidate.category);
        self.failed.push(id.to_string());
        self.trail(id, "failure", started, Some(reason));
    }

    fn trail(&mut self, id: &EngineId, outcome: &'static str, started: Instant, error: Option<String>) {
        if self.ctx.debug {
            self.attempts.push(Attempt {
                engine: id.clone(),
                outcome,
                elapsed_ms: ms(started.elapsed()),
                error,
            });
        }
    }

    /// Stamp timing and metadata, update request counters.
    fn finish(self, mut result: EngineResult, started: Instant) -> EngineResult {
        let elapsed = started.elapsed();
        result.processing_time = elapsed;

        let metadata = &mut result.metadata;
        metadata.insert("engine".to_string(), json!(result.engine.as_str()));
        metadata.insert("processing_time_ms".to_string(), json!(ms(elapsed)));
        metadata.insert("controller_version".to_string(), json!(CONTROLLER_VERSION));
        metadata.insert("trace_id".to_string(), json!(self.ctx.trace_id));
        if self.ctx.debug {
            let candidates: Vec<&str> = self.candidates.iter().map(|c| c.id.as_str()).collect();
            metadata.insert("candidates".to_string(), json!(candidates));
            metadata.insert(
                "primary".to_string(),
                json!(self.primary.as_ref().map(|p| p.as_str())),
            );
            metadata.insert(
                "attempts".to_string(),
                serde_json::to_value(&self.attempts).unwrap_or_default(),
            );
        }

        self.state.stats.processing_time(elapsed);
        if result.success {
            self.state.stats.success();
        }

        debug!(
            trace_id = %self.ctx.trace_id,
            engine = %result.engine,
            success = result.success,
            confidence = result.confidence,
            elapsed_ms = ms(elapsed),
            "request processed"
        );
        result
    }
}

fn fallback_result(strategy: FallbackStrategy, slots: SlotMap, confidence: f64) -> EngineResult {
    EngineResult {
        engine: EngineId::from(strategy.as_str()),
        confidence,
        slots,
        metadata: HashMap::new(),
        success: true,
        processing_time: Duration::ZERO,
        error: None,
    }
}
