//! Lifecycle scenarios
//!
//! Each scenario runs against a fresh [`ManagedHeap`] and [`Bridge`] and
//! records the observations it checked, so the CLI can print them and the
//! tests can assert on them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use serde::Serialize;
use tracing::info;

use crate::bridge::{
    Bridge, BridgeClass, BridgeConfig, BridgeMetricsSnapshot, ClassProvider, ClassRegistry,
    ObjectBase, Phase, to_runtime, to_shared, with_native,
};
use crate::error::Result;
use crate::runtime::{HeapConfig, HeapStats, ManagedHeap, ManagedRuntime, StrongRef};

/// Native object used by the scenarios
#[derive(Debug)]
pub struct Widget {
    base: ObjectBase,
    label: String,
    value: AtomicI64,
    dropped: Arc<AtomicBool>,
}

crate::bridge_class!(Widget, base, "demo/Widget");

fn register_demo_classes(registry: &ClassRegistry) {
    registry.register_type::<Widget>();
}

inventory::submit! {
    ClassProvider {
        register: register_demo_classes,
    }
}

impl Widget {
    /// A widget and the flag its destructor sets.
    pub fn new(label: impl Into<String>) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let widget = Self {
            base: ObjectBase::new(),
            label: label.into(),
            value: AtomicI64::new(0),
            dropped: Arc::clone(&dropped),
        };
        (widget, dropped)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::Relaxed) + delta
    }
}

impl Drop for Widget {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    Unbridged,
    Identity,
    SelfOwned,
    RuntimeConstructed,
    RoundTrip,
    NullRoundTrip,
    Rebind,
}

impl Scenario {
    pub const ALL: [Self; 7] = [
        Self::Unbridged,
        Self::Identity,
        Self::SelfOwned,
        Self::RuntimeConstructed,
        Self::RoundTrip,
        Self::NullRoundTrip,
        Self::Rebind,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unbridged => "unbridged",
            Self::Identity => "identity",
            Self::SelfOwned => "self-owned",
            Self::RuntimeConstructed => "runtime-constructed",
            Self::RoundTrip => "round-trip",
            Self::NullRoundTrip => "null-round-trip",
            Self::Rebind => "rebind",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Unbridged => "an object that never crosses into the runtime allocates no shell",
            Self::Identity => "repeated get_ref returns one shell carrying the object's handle",
            Self::SelfOwned => "a reachable shell keeps the object alive; finalization frees it",
            Self::RuntimeConstructed => "runtime-initiated construction adopts the runtime object",
            Self::RoundTrip => "native to runtime and back yields the same Arc",
            Self::NullRoundTrip => "empty values map to null references and back",
            Self::Rebind => "a shell collected before finalization is replaced and the late notification ignored",
        }
    }

    /// Run the scenario against a fresh heap and bridge.
    pub fn run(self) -> Result<ScenarioReport> {
        let heap_config = match self {
            Self::Rebind => HeapConfig::deferred_finalization(),
            _ => HeapConfig::default(),
        };
        let heap = Arc::new(ManagedHeap::new(heap_config));
        let bridge = Bridge::install(heap.clone(), BridgeConfig::default());

        let mut report = ScenarioReport::new(self);
        match self {
            Self::Unbridged => unbridged(&heap, &bridge, &mut report),
            Self::Identity => identity(&bridge, &mut report)?,
            Self::SelfOwned => self_owned(&heap, &bridge, &mut report)?,
            Self::RuntimeConstructed => runtime_constructed(&heap, &bridge, &mut report)?,
            Self::RoundTrip => round_trip(&bridge, &mut report)?,
            Self::NullRoundTrip => null_round_trip(&bridge, &mut report)?,
            Self::Rebind => rebind(&heap, &bridge, &mut report)?,
        }

        report.bridge = bridge.metrics().snapshot();
        report.heap = heap.stats();
        info!(
            scenario = self.name(),
            passed = report.passed(),
            "scenario finished"
        );
        Ok(report)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| format!("unknown scenario `{s}`"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub description: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub checks: Vec<Check>,
    pub bridge: BridgeMetricsSnapshot,
    pub heap: HeapStats,
}

impl ScenarioReport {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            checks: Vec::new(),
            bridge: BridgeMetricsSnapshot::default(),
            heap: HeapStats::default(),
        }
    }

    fn check(&mut self, description: impl Into<String>, passed: bool) {
        self.checks.push(Check {
            description: description.into(),
            passed,
        });
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }
}

fn unbridged(heap: &ManagedHeap, bridge: &Bridge, report: &mut ScenarioReport) {
    let (widget, dropped) = Widget::new("unbridged");
    let widget = Arc::new(widget);
    report.check("object starts unattached", widget.base.phase() == Phase::Unattached);

    drop(widget);
    report.check("destructor ran on last release", dropped.load(Ordering::SeqCst));
    report.check("no runtime allocation", heap.stats().allocations == 0);
    report.check(
        "no shell created",
        bridge.metrics().snapshot().shells_created == 0,
    );
}

fn identity(bridge: &Bridge, report: &mut ScenarioReport) -> Result<()> {
    let (widget, _) = Widget::new("identity");
    let widget = Arc::new(widget);

    let first = bridge.get_ref(&widget)?;
    let second = bridge.get_ref(&widget)?;
    report.check("get_ref twice returns one shell", first == second);
    report.check(
        "shell ptr holds the object's handle",
        first.get_ptr()?.is_some() && first.get_ptr()? == widget.base.handle(),
    );
    report.check("object is attached", widget.base.is_attached());
    Ok(())
}

fn self_owned(heap: &ManagedHeap, bridge: &Bridge, report: &mut ScenarioReport) -> Result<()> {
    let (widget, dropped) = Widget::new("self-owned");
    let widget = Arc::new(widget);
    let shell = bridge.get_ref(&widget)?;

    drop(widget);
    heap.collect();
    report.check(
        "rooted shell keeps the object alive",
        !dropped.load(Ordering::SeqCst),
    );

    let alive = with_native(bridge, shell.reference(), |w: &Widget| w.add(2))?;
    report.check("object reachable through its shell", alive == 2);

    drop(shell);
    heap.collect();
    report.check(
        "finalization destroys the object",
        dropped.load(Ordering::SeqCst),
    );
    Ok(())
}

fn runtime_constructed(
    heap: &Arc<ManagedHeap>,
    bridge: &Bridge,
    report: &mut ScenarioReport,
) -> Result<()> {
    let runtime: Arc<dyn ManagedRuntime> = heap.clone();
    let object = StrongRef::allocate(runtime, &Widget::CLASS)?;
    let id = object.id();

    let widget = bridge
        .construct::<Widget>(object.clone())
        .create(bridge, || Widget::new("runtime-constructed").0)?;
    report.check(
        "shell is the runtime-provided object",
        widget.base.shell_id() == Some(id),
    );

    let shell = bridge.get_ref(&widget)?;
    report.check("get_ref returns the same object", shell.id() == id);

    let shared = to_shared::<Widget>(bridge, Some(&object))?;
    report.check(
        "runtime reference converts back to the object",
        shared.is_some_and(|shared| Arc::ptr_eq(&shared, &widget)),
    );
    Ok(())
}

fn round_trip(bridge: &Bridge, report: &mut ScenarioReport) -> Result<()> {
    let (widget, _) = Widget::new("round-trip");
    let widget = Arc::new(widget);

    let reference = to_runtime(bridge, Some(&widget))?;
    report.check("runtime reference produced", reference.is_some());

    let back = to_shared::<Widget>(bridge, reference.as_ref())?;
    report.check(
        "same Arc after the round trip",
        back.is_some_and(|back| Arc::ptr_eq(&back, &widget)),
    );
    Ok(())
}

fn null_round_trip(bridge: &Bridge, report: &mut ScenarioReport) -> Result<()> {
    let reference = to_runtime::<Widget>(bridge, None)?;
    report.check("empty value becomes a null reference", reference.is_none());

    let native = to_shared::<Widget>(bridge, None)?;
    report.check("null reference becomes an empty value", native.is_none());
    Ok(())
}

fn rebind(heap: &ManagedHeap, bridge: &Bridge, report: &mut ScenarioReport) -> Result<()> {
    let (widget, dropped) = Widget::new("rebind");
    let widget = Arc::new(widget);

    let first = bridge.get_ref(&widget)?;
    let first_id = first.id();
    let handle = widget.base.handle();
    drop(first);
    heap.collect();
    report.check(
        "old shell awaits finalization",
        heap.pending_finalization() == 1,
    );

    let second = bridge.get_ref(&widget)?;
    report.check("a new shell is bound", second.id() != first_id);
    report.check("the handle is kept", second.get_ptr()? == handle);

    heap.run_finalizers();
    report.check(
        "late notification for the old shell is ignored",
        widget.base.is_attached() && bridge.metrics().snapshot().stale_notifications == 1,
    );

    drop(second);
    heap.collect();
    heap.run_finalizers();
    report.check(
        "new shell's finalization releases the object",
        widget.base.phase() == Phase::Finalized,
    );

    drop(widget);
    report.check("object destroyed", dropped.load(Ordering::SeqCst));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scenario_passes() {
        for scenario in Scenario::ALL {
            let report = scenario.run().unwrap();
            let failed: Vec<_> = report
                .checks
                .iter()
                .filter(|check| !check.passed)
                .map(|check| check.description.as_str())
                .collect();
            assert!(failed.is_empty(), "{scenario}: {failed:?}");
        }
    }

    #[test]
    fn scenario_names_parse() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>(), Ok(scenario));
        }
        assert!("missing".parse::<Scenario>().is_err());
    }
}
