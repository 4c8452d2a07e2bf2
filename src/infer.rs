//! The inference driver: walks the graph in dependency order, invokes each
//! node's processor, and aggregates failures.
//!
//! A node-local error never aborts the pass; independent subgraphs keep
//! resolving so the caller sees every problem in one run. Nodes downstream
//! of a failure are skipped and noted once as dependency-blocked. Cycle and
//! ordering violations are pass-fatal because they indicate a precondition
//! violation by the caller.

use derive_new::new;

use crate::error::IrError;
use crate::graph::Graph;
use crate::ir::{NodeId, ResolutionState, Tensor};
use crate::processor::{processor_for, InferenceCtx};

/// One failed node: `(node id, error kind, message)` as data.
#[derive(Debug, Clone, PartialEq, new)]
pub struct NodeError {
    pub node: NodeId,
    pub name: String,
    pub error: IrError,
}

/// Outcome of a single inference pass.
#[derive(Debug, Default)]
pub struct InferenceReport {
    /// Per-node failures, in visitation order.
    pub errors: Vec<NodeError>,
    /// Nodes skipped because a transitive dependency failed. Reported once
    /// each, separately from the causing errors.
    pub blocked: Vec<NodeId>,
    /// Pass-fatal precondition violation, if any.
    pub fatal: Option<IrError>,
}

impl InferenceReport {
    /// True when every node resolved its shape and dtype.
    pub fn success(&self) -> bool {
        self.fatal.is_none() && self.errors.is_empty()
    }
}

/// Run one inference pass over the graph, mutating tensors in place.
///
/// Visits nodes in topological order exactly once. Re-running on an
/// already-resolved graph is idempotent: attribute derivations are cached
/// per node and every processor is a pure function of its inputs.
pub fn run(graph: &mut Graph) -> InferenceReport {
    let mut report = InferenceReport::default();

    let order = match graph.topological_order() {
        Ok(order) => order,
        Err(err) => {
            report.fatal = Some(err);
            return report;
        }
    };

    let mut failed = vec![false; graph.num_nodes()];

    for node_id in order {
        let node = graph.node(node_id);
        log::debug!("inferring {node}");

        // Skip (once) anything downstream of a failure.
        let upstream_failed = node
            .inputs
            .iter()
            .any(|&t| graph.tensor(t).producer().is_some_and(|p| failed[p]));
        if upstream_failed {
            failed[node_id] = true;
            report.blocked.push(node_id);
            continue;
        }

        // With a correct topological order every produced input is resolved
        // by now; anything else is a caller precondition violation.
        for &tensor_id in &node.inputs {
            let tensor = graph.tensor(tensor_id);
            if tensor.producer().is_some() && !tensor.is_resolved() {
                report.fatal = Some(IrError::InternalOrderingViolation(format!(
                    "input '{}' of {node} visited before resolution",
                    tensor.name
                )));
                return report;
            }
        }

        let processor = processor_for(node.op);

        // Arity bounds from the operator's declared spec.
        let spec = processor.spec();
        if !spec.inputs.accepts(node.inputs.len()) {
            report.errors.push(NodeError::new(
                node_id,
                node.name.clone(),
                IrError::MalformedOperator(format!(
                    "{node} expects {} inputs, got {}",
                    spec.inputs,
                    node.inputs.len()
                )),
            ));
            failed[node_id] = true;
            continue;
        }
        if !spec.outputs.accepts(node.outputs.len()) {
            report.errors.push(NodeError::new(
                node_id,
                node.name.clone(),
                IrError::MalformedOperator(format!(
                    "{node} expects {} outputs, got {}",
                    spec.outputs,
                    node.outputs.len()
                )),
            ));
            failed[node_id] = true;
            continue;
        }

        let input_ids = node.inputs.clone();
        let output_ids = node.outputs.clone();
        let op = node.op;

        let input_snapshot: Vec<Tensor> = input_ids
            .iter()
            .map(|&t| graph.tensor(t).clone())
            .collect();
        let mut outputs: Vec<Tensor> = output_ids
            .iter()
            .map(|&t| std::mem::take(graph.tensor_mut(t)))
            .collect();
        // Failed nodes must leave their outputs untouched.
        let saved_outputs = outputs.clone();

        let node = graph.node_mut(node_id);
        let result = {
            let mut ctx = InferenceCtx {
                op,
                node_name: &node.name,
                inputs: &input_snapshot,
                outputs: &mut outputs,
                attrs: &mut node.attrs,
            };
            processor.infer(&mut ctx)
        };

        match result {
            Ok(()) if outputs.iter().all(Tensor::is_resolved) => {
                if processor.is_stateful() {
                    for out in &mut outputs {
                        out.data = None;
                    }
                }
                node.state = if outputs.iter().all(|t| t.data.is_some()) {
                    ResolutionState::ValueKnown
                } else {
                    ResolutionState::DtypeKnown
                };
                for (&tensor_id, out) in output_ids.iter().zip(outputs) {
                    *graph.tensor_mut(tensor_id) = out;
                }
            }
            Ok(()) => {
                // A processor that reports success without resolving shape
                // and dtype violated its own contract.
                let name = node.name.clone();
                report.errors.push(NodeError::new(
                    node_id,
                    name,
                    IrError::MalformedOperator(format!(
                        "{} left outputs unresolved",
                        graph.node(node_id)
                    )),
                ));
                failed[node_id] = true;
                for (&tensor_id, out) in output_ids.iter().zip(saved_outputs) {
                    *graph.tensor_mut(tensor_id) = out;
                }
            }
            Err(error) => {
                log::debug!("inference failed for node {node_id}: {error}");
                report
                    .errors
                    .push(NodeError::new(node_id, node.name.clone(), error));
                failed[node_id] = true;
                for (&tensor_id, out) in output_ids.iter().zip(saved_outputs) {
                    *graph.tensor_mut(tensor_id) = out;
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeStore;
    use crate::ir::{DType, OpKind, Tensor, TensorData, TensorValue};

    #[test]
    fn unary_chain_resolves() {
        let mut g = Graph::new();
        let x = g.add_tensor(Tensor::constant(
            "x",
            TensorData::new(vec![2], TensorValue::F32(vec![-1.0, 2.0])),
        ));
        let t1 = g.add_tensor(Tensor::unresolved("t1"));
        let t2 = g.add_tensor(Tensor::unresolved("t2"));
        let a = g
            .add_node(OpKind::Relu, "relu", vec![x], vec![t1], AttributeStore::new())
            .unwrap();
        g.add_node(OpKind::Neg, "neg", vec![t1], vec![t2], AttributeStore::new())
            .unwrap();

        let report = run(&mut g);
        assert!(report.success(), "{:?}", report.errors);
        assert_eq!(g.node(a).state(), ResolutionState::ValueKnown);
        assert_eq!(
            g.tensor(t2).data.as_ref().unwrap().value(),
            &TensorValue::F32(vec![0.0, -2.0])
        );
    }

    #[test]
    fn failed_node_blocks_dependents_once() {
        let mut g = Graph::new();
        let x = g.add_tensor(Tensor::with_type("x", DType::F32, vec![2]));
        let t1 = g.add_tensor(Tensor::unresolved("t1"));
        let t2 = g.add_tensor(Tensor::unresolved("t2"));
        let t3 = g.add_tensor(Tensor::unresolved("t3"));

        // Concat without its required axis attribute fails...
        let bad = g
            .add_node(
                OpKind::Concat,
                "concat",
                vec![x],
                vec![t1],
                AttributeStore::new(),
            )
            .unwrap();
        // ...and both transitive dependents are blocked, not errored.
        let down1 = g
            .add_node(OpKind::Relu, "down1", vec![t1], vec![t2], AttributeStore::new())
            .unwrap();
        let down2 = g
            .add_node(OpKind::Neg, "down2", vec![t2], vec![t3], AttributeStore::new())
            .unwrap();

        let report = run(&mut g);
        assert!(!report.success());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].node, bad);
        assert!(matches!(
            report.errors[0].error,
            IrError::MissingRequiredAttribute { .. }
        ));
        assert_eq!(report.blocked, vec![down1, down2]);
        assert!(!g.tensor(t1).is_resolved());
        assert_eq!(g.node(down1).state(), ResolutionState::Unresolved);
    }

    #[test]
    fn cycle_aborts_the_pass() {
        let mut g = Graph::new();
        let t1 = g.add_tensor(Tensor::unresolved("t1"));
        let t2 = g.add_tensor(Tensor::unresolved("t2"));
        g.add_node(OpKind::Relu, "a", vec![t2], vec![t1], AttributeStore::new())
            .unwrap();
        g.add_node(OpKind::Neg, "b", vec![t1], vec![t2], AttributeStore::new())
            .unwrap();

        let report = run(&mut g);
        assert_eq!(report.fatal, Some(IrError::GraphCycleDetected));
        assert!(report.errors.is_empty());
    }

    #[test]
    fn below_minimum_arity_is_malformed_not_a_panic() {
        let mut g = Graph::new();
        let a = g.add_tensor(Tensor::with_type("a", DType::U8, vec![2]));
        let b = g.add_tensor(Tensor::with_type("b", DType::U8, vec![2]));
        let scale = g.add_tensor(Tensor::constant(
            "a_scale",
            TensorData::scalar(TensorValue::F32(vec![0.5])),
        ));
        let out = g.add_tensor(Tensor::unresolved("out"));

        // Only 3 of the minimum 7 quantized-add inputs.
        g.add_node(
            OpKind::QLinearAdd,
            "qadd",
            vec![a, scale, b],
            vec![out],
            AttributeStore::new(),
        )
        .unwrap();

        let report = run(&mut g);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0].error,
            IrError::MalformedOperator(_)
        ));
        assert!(!g.tensor(out).is_resolved());
    }
}
