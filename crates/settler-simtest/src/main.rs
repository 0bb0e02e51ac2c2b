//! Settler Task Scheduling Harness
//!
//! Builds a small settlement from `data/colony.json`, runs it for a number
//! of sols, and checks the scheduler's invariants along the way.
//! Runs entirely in-process, no rendering.
//!
//! Usage:
//!   cargo run -p settler-simtest
//!   cargo run -p settler-simtest -- --verbose --sols 5 --seed 7

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;

use settler_tasks::cache::TaskCache;
use settler_tasks::controller::TaskController;
use settler_tasks::job::TaskJob;
use settler_tasks::prelude::*;

// ── Colony definition ───────────────────────────────────────────────────
const COLONY_JSON: &str = include_str!("../../../data/colony.json");

#[derive(Debug, Deserialize)]
struct ColonySpec {
    settlement: SettlementSpec,
    crew: Vec<CrewSpec>,
    robots: Vec<RobotSpec>,
}

#[derive(Debug, Deserialize)]
struct SettlementSpec {
    name: String,
    capacity: u32,
    #[serde(default)]
    radiation: RadiationStatus,
    facilities: Vec<FacilitySpec>,
    #[serde(default)]
    preferences: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct FacilitySpec {
    kind: FacilityKind,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CrewSpec {
    name: String,
    job: JobType,
    #[serde(default)]
    role: Option<RoleType>,
    #[serde(default)]
    shift: WorkShift,
}

#[derive(Debug, Deserialize)]
struct RobotSpec {
    name: String,
    robot_type: RobotType,
}

const HOME: SettlementId = SettlementId(1);

// ── CLI ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "settler-simtest")]
#[command(about = "Headless scheduling harness for settler-tasks", long_about = None)]
struct Args {
    /// Print every check and the final agent summaries
    #[arg(short, long)]
    verbose: bool,

    /// Sols to simulate
    #[arg(long, default_value_t = 3)]
    sols: u32,

    /// Seed for the engine rng
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Millisols per tick
    #[arg(long, default_value_t = 5.0)]
    pulse: f64,

    /// Scheduler config overrides (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    println!("=== Settler Task Scheduling Harness ===\n");
    tracing::info!(sols = args.sols, seed = args.seed, pulse = args.pulse, "harness starting");

    let config = match &args.config {
        Some(path) => match SchedulerConfig::from_path(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => SchedulerConfig::default(),
    };

    let colony: ColonySpec = match serde_json::from_str(COLONY_JSON) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Bad colony definition: {}", e);
            std::process::exit(2);
        }
    };

    let mut results = Vec::new();

    // 1. Configuration
    results.extend(validate_config(&config));

    // 2. Descriptor registry
    results.extend(validate_registry(&config));

    // 3. Selection caches for the whole crew
    results.extend(validate_selection(&config, &colony));

    // 4. Shared settlement pool
    results.extend(validate_pool(&config, &colony));

    // 5. Multi-sol colony run
    results.extend(validate_colony_run(&args, &config, &colony));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, total, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

fn build_context(config: &SchedulerConfig, colony: &ColonySpec) -> SchedulingContext {
    let spec = &colony.settlement;
    let mut ctx = SchedulingContext::new(config.clone())
        .with_clock(MarsClock::new(MarsTime::new(1, 0.0)));
    let mut settlement = Settlement::new(HOME, &spec.name, spec.capacity);
    settlement.radiation = spec.radiation;
    for f in &spec.facilities {
        settlement.add_facility(f.kind, &f.name);
    }
    for (task, modifier) in &spec.preferences {
        settlement.set_preference(task, *modifier);
    }
    ctx.add_settlement(settlement);
    ctx
}

fn build_crew(colony: &ColonySpec) -> Vec<Colonist> {
    let mut id = 0;
    let mut crew = Vec::new();
    for c in &colony.crew {
        id += 1;
        let mut person = Colonist::person(id, &c.name, HOME)
            .with_job(c.job)
            .with_shift(c.shift);
        person.role = c.role;
        crew.push(person);
    }
    for r in &colony.robots {
        id += 1;
        crew.push(Colonist::robot(id, &r.name, HOME, r.robot_type));
    }
    crew
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(config: &SchedulerConfig) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    results.push(check(
        "config_sane",
        config.history_sols > 0 && config.max_subtask_depth > 0 && config.time_epsilon > 0.0,
        format!(
            "history {} sols, subtask depth {}, epsilon {}",
            config.history_sols, config.max_subtask_depth, config.time_epsilon
        ),
    ));

    let rejected = matches!(SchedulerConfig::from_json_str("{ not json"), Err(TaskError::Config(_)));
    results.push(check(
        "config_rejects_bad_json",
        rejected,
        "malformed overrides surface a config error".into(),
    ));

    results.push(check(
        "config_sleep_uninterruptible",
        config.is_non_interruptible("Sleep", "Sleeping in quarters"),
        format!("fragments: {:?}", config.non_interruptible),
    ));

    results
}

// ── 2. Registry ─────────────────────────────────────────────────────────

fn validate_registry(config: &SchedulerConfig) -> Vec<TestResult> {
    println!("--- Descriptor Registry ---");
    let mut results = Vec::new();
    let ctx = SchedulingContext::new(config.clone());

    let was_built = ctx.is_initialized();
    let registry = ctx.initialize();
    results.push(check(
        "registry_lazy",
        !was_built && ctx.is_initialized(),
        format!("{} descriptors built on first use", registry.len()),
    ));

    results.push(check(
        "registry_partitions",
        !registry.person_tasks().is_empty() && !registry.robot_tasks().is_empty(),
        format!(
            "{} person, {} robot, {} duty, {} off-duty, {} pool providers",
            registry.person_tasks().len(),
            registry.robot_tasks().len(),
            registry.duty_tasks().len(),
            registry.non_duty_tasks().len(),
            registry.settlement_providers().len()
        ),
    ));

    let found = registry.lookup_by_id("SLEEP").is_some() && registry.lookup_by_id("Eat-Drink").is_some();
    results.push(check(
        "registry_lookup_case_insensitive",
        found,
        "fallback descriptors resolvable by ID".into(),
    ));

    let shelter_id = ctx.shelter_task().descriptor().id().to_string();
    results.push(check(
        "registry_shelter_synthetic",
        registry.lookup_by_id(&shelter_id).is_none(),
        format!("'{}' kept out of the draw", shelter_id),
    ));

    results
}

// ── 3. Selection caches ─────────────────────────────────────────────────

fn validate_selection(config: &SchedulerConfig, colony: &ColonySpec) -> Vec<TestResult> {
    println!("--- Selection Caches ---");
    let mut results = Vec::new();
    let mut ctx = build_context(config, colony);
    ctx.advance(400.0);
    let crew = build_crew(colony);

    let mut reused = 0;
    let mut balanced = 0;
    let mut non_empty = 0;
    for worker in &crew {
        let mut tc = TaskController::new(worker.id, ctx.config());
        let first = tc.rebuild_task_cache(worker, &ctx);
        let second = tc.rebuild_task_cache(worker, &ctx);
        if Arc::ptr_eq(&first, &second) {
            reused += 1;
        }
        if cache_balanced(&first) {
            balanced += 1;
        }
        if !first.is_empty() {
            non_empty += 1;
        }
        log::debug!("{}: {} cache, {} jobs", worker.name, first.context(), first.len());
    }

    results.push(check(
        "cache_reused_within_tick",
        reused == crew.len(),
        format!("{}/{} caches reused", reused, crew.len()),
    ));
    results.push(check(
        "cache_total_matches",
        balanced == crew.len(),
        format!("{}/{} totals equal the sum of weights", balanced, crew.len()),
    ));
    results.push(check(
        "cache_never_empty",
        non_empty == crew.len(),
        format!("{}/{} workers have something to draw", non_empty, crew.len()),
    ));

    results
}

fn cache_balanced(cache: &TaskCache) -> bool {
    let sum: f64 = cache.entries().map(|(_, w)| w).sum();
    (sum - cache.total()).abs() < 1e-9
}

// ── 4. Settlement pool ──────────────────────────────────────────────────

fn validate_pool(config: &SchedulerConfig, colony: &ColonySpec) -> Vec<TestResult> {
    println!("--- Settlement Pool ---");
    let mut results = Vec::new();
    let mut ctx = build_context(config, colony);
    ctx.advance(400.0);
    let crew: Vec<Colonist> = build_crew(colony)
        .into_iter()
        .filter(|c| c.kind == WorkerKind::Person)
        .collect();

    let Some(settlement) = ctx.settlement(HOME) else {
        results.push(check("pool_settlement", false, "no home settlement".into()));
        return results;
    };
    settlement.wear_facilities(1000.0);

    let offers: Vec<(&Colonist, Arc<dyn TaskJob>)> = crew
        .iter()
        .filter_map(|c| {
            settlement
                .task_jobs_for(c, &ctx)
                .into_iter()
                .find(|j| j.description().starts_with("Maintain"))
                .map(|j| (c, j))
        })
        .collect();
    let target = offers.first().map(|(_, j)| j.description().to_string()).unwrap_or_default();
    results.push(check(
        "pool_offers_maintenance",
        offers.len() == crew.len(),
        format!("{} of {} settlers offered '{}'", offers.len(), crew.len(), target),
    ));

    let granted = offers
        .iter()
        .filter(|(c, j)| j.description() == target && j.create_task(*c, &ctx).is_ok())
        .count();
    results.push(check(
        "pool_demand_one_granted_once",
        granted == 1,
        format!("{} settlers got '{}'", granted, target),
    ));

    let still_offered = crew.iter().any(|c| {
        settlement
            .task_jobs_for(c, &ctx)
            .iter()
            .any(|j| j.description() == target)
    });
    results.push(check(
        "pool_consumed_job_gone",
        !still_offered,
        format!("generation {} no longer lists it", settlement.pool().generation()),
    ));

    ctx.invalidate_pools();
    results.push(check(
        "pool_invalidated",
        ctx.settlement(HOME).is_some_and(|s| s.pool().is_empty()),
        "invalidation empties the pool until the next query".into(),
    ));

    results
}

// ── 5. Colony run ───────────────────────────────────────────────────────

fn validate_colony_run(args: &Args, config: &SchedulerConfig, colony: &ColonySpec) -> Vec<TestResult> {
    println!("--- Colony Run ({} sols, seed {}) ---", args.sols, args.seed);
    let mut results = Vec::new();
    let ctx = build_context(config, colony);
    let sink = Arc::new(RecordingSink::new());
    let mut engine = ColonyEngine::new(ctx, sink.clone(), args.seed);
    for worker in build_crew(colony) {
        engine.spawn_colonist(worker);
    }

    let pulse = args.pulse.max(0.1);
    let ticks = (f64::from(args.sols) * 1000.0 / pulse).ceil() as usize;
    let mut failures = 0;
    let mut sols_seen = 0;
    for _ in 0..ticks {
        let report = engine.update(pulse);
        failures += report.failures;
        if report.new_sol {
            sols_seen += 1;
        }
    }

    results.push(check(
        "run_no_failures",
        failures == 0,
        format!("{} failed agent ticks over {} ticks", failures, ticks),
    ));
    results.push(check(
        "run_sol_rollover",
        sols_seen == args.sols,
        format!("{} sol boundaries crossed, now {}", sols_seen, engine.context().now()),
    ));

    let mut idle = Vec::new();
    let mut window_ok = true;
    engine.for_each_controller(|c, tc| {
        if !tc.has_active_task() && tc.last_task().is_none() {
            idle.push(c.name.clone());
        }
        if tc.activity_log().sols().len() > config.history_sols as usize {
            window_ok = false;
        }
    });
    results.push(check(
        "run_everyone_worked",
        idle.is_empty(),
        if idle.is_empty() {
            "every agent ran at least one task".into()
        } else {
            format!("never scheduled: {:?}", idle)
        },
    ));
    results.push(check(
        "run_log_window",
        window_ok,
        format!("activity logs hold at most {} sols", config.history_sols),
    ));

    let started = sink.count(|e| matches!(e, TaskEvent::Started { .. }));
    let ended = sink.count(|e| matches!(e, TaskEvent::Ended { level: 0, .. }));
    results.push(check(
        "run_events",
        started > 0 && ended > 0 && ended <= started,
        format!("{} started, {} ended", started, ended),
    ));

    let shared = sink.count(|e| {
        matches!(e, TaskEvent::Started { task, .. } if task == "Maintenance" || task == "Cook Meal")
    });
    println!("  settlement jobs taken: {}", shared);
    println!(
        "  sub-tasks started: {}",
        sink.count(|e| matches!(e, TaskEvent::SubTaskAdded { .. }))
    );

    if args.verbose {
        for s in engine.summaries() {
            println!(
                "  {:<14} {:<18} {:<28} {}",
                s.name,
                s.task.as_deref().unwrap_or("-"),
                s.description.as_deref().unwrap_or("-"),
                s.leaf.as_deref().unwrap_or("-")
            );
        }
        if let Ok(json) = serde_json::to_string(&engine.summaries()) {
            log::debug!("summaries: {}", json);
        }
    }

    results
}
