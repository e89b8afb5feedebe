/// Utilities for unit tests, benchmarks and the command line's random runs.
use crate::node_model::{NodeModelFixedInput, NodeModelInput, NodeModelSolution};
use crate::TraflowError;
use float_cmp::{approx_eq, F64Margin};
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// A four-leg intersection where outgoing link 2 is the binding bottleneck.
pub fn four_by_four_input() -> NodeModelInput {
    let fixed = NodeModelFixedInput::new(
        vec![1000.0, 2000.0, 1000.0, 2000.0],
        vec![1000.0, 2000.0, 1000.0, 2000.0],
    )
    .unwrap();

    NodeModelInput::from_rows(
        fixed,
        &[
            vec![0.0, 50.0, 150.0, 300.0],
            vec![100.0, 0.0, 300.0, 1600.0],
            vec![100.0, 100.0, 0.0, 600.0],
            vec![100.0, 800.0, 800.0, 0.0],
        ],
    )
    .unwrap()
}

/// Make a random node with between one and the given maximum numbers of incoming and outgoing
/// links.
///
/// Capacities are drawn around 1800 pcu/h. Roughly a quarter of the turns carry no flow and a
/// fifth of the outgoing links are congested, so both unconstrained and constrained nodes occur.
pub fn make_random_input<R: Rng>(
    max_incoming: usize,
    max_outgoing: usize,
    rng: &mut R,
) -> Result<NodeModelInput, TraflowError> {
    let capacity_distr = Normal::<f64>::new(1800.0, 400.0)
        .map_err(|e| TraflowError::invalid(format!("capacity distribution: {e}")))?;
    let demand_distr = Normal::<f64>::new(400.0, 250.0)
        .map_err(|e| TraflowError::invalid(format!("demand distribution: {e}")))?;

    let num_incoming = rng.gen_range(1..=max_incoming.max(1));
    let num_outgoing = rng.gen_range(1..=max_outgoing.max(1));

    let incoming_capacities = (0..num_incoming)
        .map(|_| capacity_distr.sample(rng).max(100.0))
        .collect();
    let outgoing_receiving_flows = (0..num_outgoing)
        .map(|_| {
            let capacity: f64 = capacity_distr.sample(rng).max(100.0);
            if rng.gen_bool(0.2) {
                capacity * rng.gen_range(0.0..0.5)
            } else {
                capacity
            }
        })
        .collect();

    let mut turn_sending_flows = Array2::zeros((num_incoming, num_outgoing));
    for flow in turn_sending_flows.iter_mut() {
        if rng.gen_bool(0.75) {
            *flow = demand_distr.sample(rng).max(0.0);
        }
    }

    let fixed = NodeModelFixedInput::new(incoming_capacities, outgoing_receiving_flows)?;
    NodeModelInput::new(fixed, turn_sending_flows)
}

/// Make `num_nodes` random nodes; see [`make_random_input`].
pub fn make_random_inputs<R: Rng>(
    num_nodes: usize,
    max_incoming: usize,
    max_outgoing: usize,
    rng: &mut R,
) -> Result<Vec<NodeModelInput>, TraflowError> {
    (0..num_nodes)
        .map(|_| make_random_input(max_incoming, max_outgoing, rng))
        .collect()
}

/// Compare two arrays of f64
pub fn assert_approx_array_eq(calculated_values: &[f64], expected_values: &[f64], epsilon: f64) {
    assert_eq!(
        calculated_values.len(),
        expected_values.len(),
        "arrays differ in length"
    );
    let margins = F64Margin { epsilon, ulps: 4 };
    for (i, (calculated, expected)) in calculated_values.iter().zip(expected_values).enumerate() {
        if !approx_eq!(f64, *calculated, *expected, margins) {
            panic!(
                r#"assertion failed on item #{i:?}
                    actual: `{calculated:?}`,
                    expected: `{expected:?}`"#,
            )
        }
    }
}

/// Assert that no outgoing link receives more than its receiving flow.
pub fn assert_conservation(input: &NodeModelInput, solution: &NodeModelSolution, epsilon: f64) {
    let factors = solution.flow_acceptance_factors();
    for (j, receiving) in input.outgoing_receiving_flows().iter().enumerate() {
        let inflow: f64 = (0..input.num_incoming())
            .map(|i| input.clipped_turn_sending_flow(i, j) * factors[i])
            .sum();
        if inflow > receiving + epsilon {
            panic!("outgoing link {j} receives {inflow} which exceeds its receiving flow {receiving}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::make_random_inputs;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_random_inputs_are_valid() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let inputs = make_random_inputs(50, 3, 5, &mut rng).unwrap();

        assert_eq!(inputs.len(), 50);
        for input in &inputs {
            assert!((1..=3).contains(&input.num_incoming()));
            assert!((1..=5).contains(&input.num_outgoing()));
            assert!(input.incoming_capacities().iter().all(|c| *c >= 100.0));
            assert!(input.outgoing_receiving_flows().iter().all(|r| *r >= 0.0));
            assert!(input.turn_sending_flows().iter().all(|s| *s >= 0.0));
        }
    }
}
