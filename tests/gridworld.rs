use spmc_core::*;
use spmc_explicit::load;
use std::path::Path;

fn grid_world() -> Model {
    load(
        Path::new("./spmc_explicit/tests/grid_world.tra"),
        Path::new("./spmc_explicit/tests/grid_world.lab"),
    )
    .unwrap()
}

fn check(model: &Model, property: &str, extract_scheduler: bool) -> CheckResult {
    let property = parse_properties(property).unwrap().pop().unwrap();
    let options = CheckOptions {
        extract_scheduler,
        ..CheckOptions::default()
    };
    model_checking(model, &property, &options).unwrap()
}

fn initial_value(result: &CheckResult) -> f64 {
    match result.initial_values().as_slice() {
        [Value::Number(value)] => *value,
        values => panic!("unexpected values {values:?}"),
    }
}

#[test]
fn safety_scheduler() {
    let model = grid_world();
    let result = check(&model, "Pmax=? [ G ! \"bad\" ]", true);
    assert!(result.has_scheduler());
    let value = initial_value(&result);
    assert!((value - 0.9921919).abs() < 1e-4, "{value}");
    let scheduler = result.scheduler().unwrap();
    assert!(scheduler.is_memoryless());
    assert_eq!(scheduler.states(), model.states());
}

#[test]
fn bounded_reachability() {
    let model = grid_world();
    let until = check(&model, "Pmax=? [ ! \"bad\" U<=30 \"good\" ]", true);
    assert!(until.has_scheduler());
    assert!(!until.scheduler().unwrap().is_memoryless());
    let until = initial_value(&until);
    assert!((until - 0.9600366).abs() < 1e-6, "{until}");
    // Bad states are absorbing, so they cannot reach good ones anyway.
    let eventually = initial_value(&check(&model, "Pmax=? [ F<=30 \"good\" ]", false));
    assert!((eventually - until).abs() < 1e-9, "{eventually} != {until}");
    let minimum = initial_value(&check(&model, "Pmin=? [ ! \"bad\" U<=30 \"good\" ]", false));
    assert!(minimum < 1e-3, "{minimum}");
}

#[derive(Default)]
struct Visits {
    bad: bool,
}

impl Tracer for &mut Visits {
    fn init(&mut self) {
        self.bad = false;
    }

    fn trace(&mut self, _step: usize, state: usize, _choice: Option<usize>) {
        // States 23 and 53 are labelled "bad".
        self.bad |= state == 23 || state == 53;
    }

    fn finalize(self, _outcome: &PathOutcome) {}
}

#[test]
fn simulate_safety_scheduler() {
    let model = grid_world();
    let result = check(&model, "Pmax=? [ G ! \"bad\" ]", true);
    let scheduler = result.scheduler().unwrap();
    let mut simulator = Simulator::new(&model, Some(1234)).with_scheduler(scheduler);
    let mut visits = Visits::default();
    let mut safe = 0;
    for _ in 0..100 {
        simulator.run(200, &mut visits);
        if !visits.bad {
            safe += 1;
        }
    }
    assert!(safe >= 90, "{safe} safe paths out of 100");
}
