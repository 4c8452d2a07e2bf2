//! End-to-end inference over whole graphs.

use qnn_ir::{
    run, AttrValue, AttributeStore, DType, Graph, IrError, OpKind, QuantParams, ResolutionState,
    Tensor, TensorData, TensorValue,
};

fn f32_scalar(v: f32) -> TensorData {
    TensorData::scalar(TensorValue::F32(vec![v]))
}

fn u8_scalar(v: u8) -> TensorData {
    TensorData::scalar(TensorValue::U8(vec![v]))
}

/// A quantized add feeding a dequantize, everything constant: both nodes
/// fold and the float result reflects the round-half-to-even requantization
/// in the middle.
#[test]
fn quantized_add_pipeline_folds_end_to_end() {
    let mut g = Graph::new();
    let a = g.add_tensor(Tensor::constant(
        "a",
        TensorData::new(vec![2], TensorValue::U8(vec![10, 20])),
    ));
    let a_scale = g.add_tensor(Tensor::constant("a_scale", f32_scalar(0.5)));
    let a_zp = g.add_tensor(Tensor::constant("a_zero_point", u8_scalar(0)));
    let b = g.add_tensor(Tensor::constant(
        "b",
        TensorData::new(vec![2], TensorValue::U8(vec![5, 5])),
    ));
    let b_scale = g.add_tensor(Tensor::constant("b_scale", f32_scalar(0.5)));
    let b_zp = g.add_tensor(Tensor::constant("b_zero_point", u8_scalar(0)));
    let c_scale = g.add_tensor(Tensor::constant("c_scale", f32_scalar(1.0)));
    let c_zp = g.add_tensor(Tensor::constant("c_zero_point", u8_scalar(0)));

    let qc = g.add_tensor(Tensor::unresolved("qc"));
    let dequantized = g.add_tensor(Tensor::unresolved("dequantized"));

    let qadd = g
        .add_node(
            OpKind::QLinearAdd,
            "qadd",
            vec![a, a_scale, a_zp, b, b_scale, b_zp, c_scale, c_zp],
            vec![qc],
            AttributeStore::new(),
        )
        .unwrap();
    g.add_node(
        OpKind::DequantizeLinear,
        "dq",
        vec![qc, c_scale, c_zp],
        vec![dequantized],
        AttributeStore::new(),
    )
    .unwrap();
    g.outputs.push(dequantized);

    let report = run(&mut g);
    assert!(report.success(), "{:?}", report.errors);

    // dequant sums to [7.5, 12.5]; requantization rounds half to even.
    assert_eq!(
        g.tensor(qc).data.as_ref().unwrap().value(),
        &TensorValue::U8(vec![8, 12])
    );
    assert_eq!(g.tensor(qc).quant, Some(QuantParams::new(1.0, 0, DType::U8)));
    assert_eq!(g.node(qadd).state(), ResolutionState::ValueKnown);

    assert_eq!(g.tensor(dequantized).dtype, Some(DType::F32));
    assert_eq!(
        g.tensor(dequantized).data.as_ref().unwrap().value(),
        &TensorValue::F32(vec![8.0, 12.0])
    );
}

/// Running inference twice over the same graph is a no-op the second time:
/// cached attribute derivations and pure processors reproduce every tensor
/// bit for bit.
#[test]
fn second_pass_is_idempotent() {
    let mut g = Graph::new();
    let x = g.add_tensor(Tensor::constant(
        "x",
        TensorData::new(vec![4], TensorValue::F32(vec![-1.0, 0.5, 2.0, -3.0])),
    ));
    let shape = g.add_tensor(Tensor::constant(
        "shape",
        TensorData::new(vec![2], TensorValue::I64(vec![2, 2])),
    ));
    let t1 = g.add_tensor(Tensor::unresolved("t1"));
    let t2 = g.add_tensor(Tensor::unresolved("t2"));
    g.add_node(
        OpKind::Relu,
        "relu",
        vec![x],
        vec![t1],
        AttributeStore::new(),
    )
    .unwrap();
    g.add_node(
        OpKind::Reshape,
        "reshape",
        vec![t1, shape],
        vec![t2],
        AttributeStore::new(),
    )
    .unwrap();

    assert!(run(&mut g).success());
    let first: Vec<Option<TensorData>> = (0..4).map(|t| g.tensor(t).data.clone()).collect();
    let first_states: Vec<ResolutionState> = g.nodes().map(|n| n.state()).collect();

    assert!(run(&mut g).success());
    let second: Vec<Option<TensorData>> = (0..4).map(|t| g.tensor(t).data.clone()).collect();
    let second_states: Vec<ResolutionState> = g.nodes().map(|n| n.state()).collect();

    assert_eq!(first, second);
    assert_eq!(first_states, second_states);
    assert_eq!(
        g.tensor(t2).data.as_ref().unwrap().shape(),
        &[2, 2]
    );
}

/// A declared attribute beats the same fact wired in as an input tensor.
#[test]
fn declared_attribute_wins_over_input_tensor() {
    let mut g = Graph::new();
    let x = g.add_tensor(Tensor::with_type("x", DType::F32, vec![2, 6]));
    g.inputs.push(x);
    let wired = g.add_tensor(Tensor::constant(
        "wired_shape",
        TensorData::new(vec![2], TensorValue::I64(vec![6, 2])),
    ));
    let y = g.add_tensor(Tensor::unresolved("y"));

    let mut attrs = AttributeStore::new();
    attrs
        .set("shape", AttrValue::IntList(vec![3, 4]))
        .unwrap();
    g.add_node(OpKind::Reshape, "reshape", vec![x, wired], vec![y], attrs)
        .unwrap();

    assert!(run(&mut g).success());
    assert_eq!(g.tensor(y).shape.as_deref(), Some(&[3, 4][..]));
}

/// One broken node reports an error and blocks its dependents, while an
/// independent chain in the same graph still resolves.
#[test]
fn failure_is_contained_to_the_dependent_subgraph() {
    let mut g = Graph::new();
    let x = g.add_tensor(Tensor::with_type("x", DType::F32, vec![2]));
    let bad_out = g.add_tensor(Tensor::unresolved("bad_out"));
    let blocked_out = g.add_tensor(Tensor::unresolved("blocked_out"));
    let y = g.add_tensor(Tensor::with_type("y", DType::F32, vec![3]));
    let good_out = g.add_tensor(Tensor::unresolved("good_out"));

    // Cast without its required target dtype fails.
    let bad = g
        .add_node(
            OpKind::Cast,
            "cast",
            vec![x],
            vec![bad_out],
            AttributeStore::new(),
        )
        .unwrap();
    let downstream = g
        .add_node(
            OpKind::Relu,
            "downstream",
            vec![bad_out],
            vec![blocked_out],
            AttributeStore::new(),
        )
        .unwrap();
    g.add_node(
        OpKind::Abs,
        "independent",
        vec![y],
        vec![good_out],
        AttributeStore::new(),
    )
    .unwrap();

    let report = run(&mut g);
    assert!(!report.success());
    assert!(report.fatal.is_none());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].node, bad);
    assert_eq!(
        report.errors[0].error,
        IrError::MissingRequiredAttribute { name: "to".into() }
    );
    assert_eq!(report.blocked, vec![downstream]);

    // The failed node's outputs stay untouched; the independent chain resolved.
    assert!(!g.tensor(bad_out).is_resolved());
    assert!(!g.tensor(blocked_out).is_resolved());
    assert!(g.tensor(good_out).is_resolved());
}

/// Constants propagate through shape-manipulating operators into a
/// quantize boundary.
#[test]
fn constant_feeds_split_and_quantize() {
    let mut g = Graph::new();
    let value = TensorData::new(vec![2, 2], TensorValue::F32(vec![0.25, 0.75, 1.25, 100.0]));
    let c = g.add_tensor(Tensor::unresolved("c"));
    let left = g.add_tensor(Tensor::unresolved("left"));
    let right = g.add_tensor(Tensor::unresolved("right"));
    let scale = g.add_tensor(Tensor::constant("scale", f32_scalar(0.5)));
    let q = g.add_tensor(Tensor::unresolved("q"));

    let mut attrs = AttributeStore::new();
    attrs.set("value", AttrValue::Tensor(value)).unwrap();
    g.add_node(OpKind::Constant, "const", vec![], vec![c], attrs)
        .unwrap();
    g.add_node(
        OpKind::Split,
        "split",
        vec![c],
        vec![left, right],
        AttributeStore::new(),
    )
    .unwrap();
    g.add_node(
        OpKind::QuantizeLinear,
        "quantize",
        vec![left, scale],
        vec![q],
        AttributeStore::new(),
    )
    .unwrap();

    let report = run(&mut g);
    assert!(report.success(), "{:?}", report.errors);

    // Split propagates type only, so the quantize input has no static value
    // and the boundary resolves dtype, shape and parameters without folding.
    assert_eq!(g.tensor(left).shape.as_deref(), Some(&[1, 2][..]));
    assert!(g.tensor(left).data.is_none());
    assert_eq!(g.tensor(q).dtype, Some(DType::U8));
    assert_eq!(g.tensor(q).quant, Some(QuantParams::new(0.5, 0, DType::U8)));
    assert!(g.tensor(q).data.is_none());
}
