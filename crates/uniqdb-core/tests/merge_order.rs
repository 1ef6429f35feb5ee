use std::thread;
use uniqdb_core::prelude::*;
use uniqdb_primitives::ValueKind;

const PARTS: u64 = 8;

fn resolve(name: &str) -> UniqAggregate {
    resolve_function(
        name,
        &[ArgumentType::Scalar(ValueKind::UInt64)],
        &UniqConfig::default(),
    )
    .expect("function resolves")
}

fn filled(aggregate: &UniqAggregate, values: impl IntoIterator<Item = u64>) -> UniqState {
    let column = [Column::UInt64(values.into_iter().collect())];
    let mut state = aggregate.initialize();
    aggregate
        .add_batch(&mut state, &column, 0..column[0].len())
        .expect("batch add succeeds");
    state
}

// Overlapping slices so every merge sees shared and fresh keys.
fn partitions(aggregate: &UniqAggregate, per_part: u64) -> Vec<UniqState> {
    (0..PARTS)
        .map(|part| {
            let start = part * per_part / 2;
            filled(aggregate, start..start + per_part)
        })
        .collect()
}

fn fold(aggregate: &UniqAggregate, parts: impl IntoIterator<Item = UniqState>) -> UniqState {
    let mut acc = aggregate.initialize();
    for part in parts {
        aggregate.merge(&mut acc, &part).expect("merge succeeds");
    }
    acc
}

fn tree(aggregate: &UniqAggregate, mut parts: Vec<UniqState>) -> UniqState {
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(mut left) = iter.next() {
            if let Some(right) = iter.next() {
                aggregate.merge(&mut left, &right).expect("merge succeeds");
            }
            next.push(left);
        }
        parts = next;
    }

    parts.pop().unwrap_or_else(|| aggregate.initialize())
}

// Order-independent view of a state: retained hashes for sampling,
// register bytes for large hybrids, the finalized count otherwise.
fn fingerprint(aggregate: &UniqAggregate, state: &UniqState) -> Vec<u64> {
    match state {
        UniqState::Sampling(sampling) => {
            let mut hashes: Vec<u64> = sampling.retained_hashes().collect();
            hashes.sort_unstable();
            hashes.push(u64::from(sampling.skip_degree()));
            hashes
        }
        UniqState::Hybrid(hybrid) if hybrid.is_large() => aggregate
            .serialize_to_vec(state)
            .expect("state serializes")
            .into_iter()
            .map(u64::from)
            .collect(),
        _ => vec![aggregate.finalize(state).expect("finalize succeeds")],
    }
}

fn assert_order_independent(name: &str, per_part: u64) {
    let aggregate = resolve(name);
    let parts = partitions(&aggregate, per_part);

    let forward = fold(&aggregate, parts.clone());
    let backward = fold(&aggregate, parts.iter().rev().cloned());
    let shuffled = fold(
        &aggregate,
        [3, 6, 0, 7, 1, 5, 2, 4].map(|idx| parts[idx].clone()),
    );
    let reduced = tree(&aggregate, parts);

    let expected = fingerprint(&aggregate, &forward);
    assert_eq!(fingerprint(&aggregate, &backward), expected, "{name} reversed");
    assert_eq!(fingerprint(&aggregate, &shuffled), expected, "{name} shuffled");
    assert_eq!(fingerprint(&aggregate, &reduced), expected, "{name} tree");

    // Merging partitions matches inserting their union directly.
    let end = (PARTS - 1) * per_part / 2 + per_part;
    let direct = filled(&aggregate, 0..end);
    assert_eq!(
        aggregate.finalize(&direct).expect("finalize"),
        aggregate.finalize(&forward).expect("finalize"),
        "{name} direct"
    );
}

#[test]
fn sampling_merge_is_order_independent() {
    assert_order_independent("uniq", 40_000);
}

#[test]
fn hybrid_merge_is_order_independent() {
    assert_order_independent("uniqHLL12", 5_000);
}

#[test]
fn small_hybrid_merge_stays_exact() {
    assert_order_independent("uniqHLL12", 3);

    let aggregate = resolve("uniqHLL12");
    let merged = fold(&aggregate, partitions(&aggregate, 3));
    assert_eq!(aggregate.finalize(&merged).expect("finalize"), 13);
}

#[test]
fn exact_merge_is_order_independent() {
    assert_order_independent("uniqExact", 10_000);
}

#[test]
fn merging_a_state_with_itself_is_idempotent() {
    for name in ["uniq", "uniqHLL12", "uniqExact"] {
        let aggregate = resolve(name);
        let mut state = filled(&aggregate, 0..50_000);
        let before = fingerprint(&aggregate, &state);
        let copy = state.clone();

        aggregate.merge(&mut state, &copy).expect("merge succeeds");
        assert_eq!(fingerprint(&aggregate, &state), before, "{name}");
    }
}

#[test]
fn worker_partials_reduce_to_the_sequential_result() {
    for name in ["uniq", "uniqHLL12", "uniqExact"] {
        let aggregate = resolve(name);

        let partials: Vec<UniqState> = thread::scope(|scope| {
            let workers: Vec<_> = (0..PARTS)
                .map(|part| {
                    let aggregate = &aggregate;
                    scope.spawn(move || {
                        filled(aggregate, (0..200_000).filter(|v| v % PARTS == part))
                    })
                })
                .collect();

            workers
                .into_iter()
                .map(|worker| worker.join().expect("worker thread completes"))
                .collect()
        });

        let reduced = tree(&aggregate, partials);
        let sequential = filled(&aggregate, 0..200_000);
        assert_eq!(
            fingerprint(&aggregate, &reduced),
            fingerprint(&aggregate, &sequential),
            "{name}"
        );
    }
}
