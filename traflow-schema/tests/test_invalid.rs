use std::fs;
use std::path::Path;
use traflow_schema::{SchemaError, TraflowModel};

macro_rules! invalid_tests {
    ($($test_func:ident: $value:expr, $expected_err:ident,)*) => {
    $(
        #[test]
        fn $test_func() {
            let input: &str = $value;
            let input_pth = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("invalid").join(input);

            let model = deserialise_test_model(&input_pth);
            let err = build_test_model(&model);
            if !matches!(err, SchemaError::$expected_err { .. }) {
                panic!("Expected error: SchemaError::{}, but got: {:?}", stringify!($expected_err), err);
            };
        }
    )*
    }
}

invalid_tests! {
    no_convergence: "no-convergence.json", NodeSolve,
    duplicate_node: "duplicate-node.json", DuplicateName,
    ragged_node: "ragged-node.json", InvalidNode,
    negative_capacity: "negative-capacity.json", InvalidNode,
    overdetermined_diagram: "overdetermined-diagram.json", OverdeterminedDiagram,
    capacity_too_large: "capacity-too-large.json", InvalidDiagram,
}

fn deserialise_test_model(model_path: &Path) -> TraflowModel {
    let data = fs::read_to_string(model_path).expect("Unable to read file");
    serde_json::from_str(&data).expect("Failed to deserialize model")
}

fn build_test_model(model: &TraflowModel) -> SchemaError {
    let result = model.build_diagrams().and_then(|_| model.solve_nodes());
    match result {
        Ok(_) => panic!("Expected an error, but model solved successfully!"),
        Err(e) => e,
    }
}
