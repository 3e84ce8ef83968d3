use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use spmc_core::*;

// A slippery gridworld: each move succeeds with probability 0.8,
// otherwise the robot stays in place.
// The goal is in the far corner, a bad cell on the diagonal.
#[inline(always)]
fn grid(size: usize) -> Model {
    let states = size * size;
    let mut builder = SparseMatrixBuilder::new();
    for state in 0..states {
        let (x, y) = (state % size, state / size);
        builder.new_group();
        let moves = [
            (x, y.saturating_sub(1)),
            (x, (y + 1).min(size - 1)),
            (x.saturating_sub(1), y),
            ((x + 1).min(size - 1), y),
        ];
        for (tx, ty) in moves {
            builder.new_row().unwrap();
            builder.add_entry(tx + ty * size, 0.8).unwrap();
            builder.add_entry(state, 0.2).unwrap();
        }
    }
    let mut labeling = Labeling::new(states);
    for (label, state) in [
        (INIT_LABEL, 0),
        ("bad", size / 2 + (size / 2) * size),
        ("goal", states - 1),
    ] {
        labeling.add_label(label).unwrap();
        labeling.add_label_to_state(label, state).unwrap();
    }
    Model::new(ModelType::Mdp, builder.build().unwrap(), labeling)
        .unwrap()
        .with_reward_model("steps", RewardModel::with_state_rewards(vec![1.0; states]))
        .unwrap()
}

fn check(c: &mut Criterion) {
    let properties = [
        ("Pmax=? [G !\"bad\"]", "globally"),
        ("Pmax=? [!\"bad\" U \"goal\"]", "until"),
        ("Pmax=? [!\"bad\" U<=30 \"goal\"]", "bounded until"),
        ("Rmin=? [F \"goal\"]", "reward"),
    ];
    for size in [10, 50] {
        let model = grid(size);
        for (property, name) in properties {
            let property = parse_properties(property).unwrap().pop().unwrap();
            c.bench_with_input(
                BenchmarkId::new(name, format!("{size}x{size} grid")),
                &property,
                |b, property| {
                    b.iter(|| model_checking(&model, property, &CheckOptions::default()).unwrap());
                },
            );
        }
    }
}

fn single_thread(c: &mut Criterion) {
    let model = grid(50);
    let property = parse_properties("Pmax=? [!\"bad\" U \"goal\"]")
        .unwrap()
        .pop()
        .unwrap();
    let options = CheckOptions {
        single_thread: true,
        ..Default::default()
    };
    c.bench_function("until single thread", |b| {
        b.iter(|| model_checking(&model, &property, &options).unwrap());
    });
}

criterion_group!(benches, check, single_thread);
criterion_main!(benches);
