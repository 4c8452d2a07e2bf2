//! Graph ownership and traversal.
//!
//! The graph exclusively owns all nodes and tensors, in insertion order.
//! Nodes reference tensors by id only, so reconvergent (diamond) paths are
//! representable without ownership cycles. Insertion order doubles as the
//! stable tie-break for topological ordering.

use std::collections::BinaryHeap;

use crate::attribute::AttributeStore;
use crate::error::IrError;
use crate::ir::{Node, NodeId, OpKind, ResolutionState, Tensor, TensorId};

/// A populated IR graph, handed over by a format-specific front end.
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) tensors: Vec<Tensor>,
    /// External inputs (tensors with no producer).
    pub inputs: Vec<TensorId>,
    /// Graph outputs.
    pub outputs: Vec<TensorId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tensor and return its id.
    pub fn add_tensor(&mut self, tensor: Tensor) -> TensorId {
        let id = self.tensors.len();
        self.tensors.push(tensor);
        id
    }

    /// Register a node, wiring producer/consumer edges.
    ///
    /// Each tensor has exactly one producer; claiming an already-produced
    /// tensor is a malformed graph.
    pub fn add_node(
        &mut self,
        op: OpKind,
        name: impl Into<String>,
        inputs: Vec<TensorId>,
        outputs: Vec<TensorId>,
        attrs: AttributeStore,
    ) -> Result<NodeId, IrError> {
        let id = self.nodes.len();
        let name = name.into();

        for &tensor_id in &outputs {
            let tensor = self.tensors.get_mut(tensor_id).ok_or_else(|| {
                IrError::MalformedOperator(format!("{name}: unknown output tensor {tensor_id}"))
            })?;
            if let Some(existing) = tensor.producer {
                return Err(IrError::MalformedOperator(format!(
                    "{name}: tensor '{}' already produced by node {existing}",
                    tensor.name
                )));
            }
            tensor.producer = Some(id);
        }
        for &tensor_id in &inputs {
            let tensor = self.tensors.get_mut(tensor_id).ok_or_else(|| {
                IrError::MalformedOperator(format!("{name}: unknown input tensor {tensor_id}"))
            })?;
            tensor.consumers.push(id);
        }

        self.nodes.push(Node {
            id,
            op,
            name,
            inputs,
            outputs,
            attrs,
            state: ResolutionState::Unresolved,
        });
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn tensor(&self, id: TensorId) -> &Tensor {
        &self.tensors[id]
    }

    pub fn tensor_mut(&mut self, id: TensorId) -> &mut Tensor {
        &mut self.tensors[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Producer of a tensor, or `None` for external inputs.
    pub fn producer(&self, tensor: TensorId) -> Option<NodeId> {
        self.tensors[tensor].producer
    }

    /// Consumers of a tensor, in insertion order.
    pub fn consumers(&self, tensor: TensorId) -> &[NodeId] {
        &self.tensors[tensor].consumers
    }

    /// Node visitation order respecting producer-before-consumer
    /// dependencies.
    ///
    /// Kahn's algorithm with a min-heap on node id, so ties between
    /// independent nodes always resolve in insertion order and the result
    /// is deterministic. Fails with [`IrError::GraphCycleDetected`] when the
    /// graph is not a DAG.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, IrError> {
        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .map(|node| {
                node.inputs
                    .iter()
                    .filter(|&&t| self.tensors[t].producer.is_some())
                    .count()
            })
            .collect();

        // Min-heap via Reverse: smallest (earliest-inserted) id first.
        let mut ready: BinaryHeap<std::cmp::Reverse<NodeId>> = pending
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(id, _)| std::cmp::Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(std::cmp::Reverse(id)) = ready.pop() {
            order.push(id);
            for &out in &self.nodes[id].outputs {
                for &consumer in &self.tensors[out].consumers {
                    pending[consumer] -= 1;
                    if pending[consumer] == 0 {
                        ready.push(std::cmp::Reverse(consumer));
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(IrError::GraphCycleDetected);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DType, Tensor};

    fn unresolved(graph: &mut Graph, name: &str) -> TensorId {
        graph.add_tensor(Tensor::unresolved(name))
    }

    /// input -> a -> t1 -> b -> t2, with c also consuming t1 (diamond-ish fanout).
    fn small_graph() -> (Graph, [NodeId; 3]) {
        let mut g = Graph::new();
        let input = g.add_tensor(Tensor::with_type("x", DType::F32, vec![2]));
        g.inputs.push(input);
        let t1 = unresolved(&mut g, "t1");
        let t2 = unresolved(&mut g, "t2");
        let t3 = unresolved(&mut g, "t3");

        let a = g
            .add_node(OpKind::Relu, "a", vec![input], vec![t1], Default::default())
            .unwrap();
        let b = g
            .add_node(OpKind::Neg, "b", vec![t1], vec![t2], Default::default())
            .unwrap();
        let c = g
            .add_node(OpKind::Abs, "c", vec![t1], vec![t3], Default::default())
            .unwrap();
        (g, [a, b, c])
    }

    #[test]
    fn producer_and_consumers_are_wired() {
        let (g, [a, b, c]) = small_graph();
        let t1 = g.nodes[a].outputs[0];
        assert_eq!(g.producer(t1), Some(a));
        assert_eq!(g.consumers(t1), &[b, c]);
        assert_eq!(g.producer(g.inputs[0]), None);
    }

    #[test]
    fn one_producer_per_tensor() {
        let mut g = Graph::new();
        let x = g.add_tensor(Tensor::with_type("x", DType::F32, vec![1]));
        let y = unresolved(&mut g, "y");
        g.add_node(OpKind::Relu, "a", vec![x], vec![y], Default::default())
            .unwrap();
        let err = g
            .add_node(OpKind::Neg, "b", vec![x], vec![y], Default::default())
            .unwrap_err();
        assert!(matches!(err, IrError::MalformedOperator(_)));
    }

    #[test]
    fn topological_order_respects_dependencies_and_insertion_ties() {
        let (g, [a, b, c]) = small_graph();
        let order = g.topological_order().unwrap();
        // a first; b and c are tied, broken by insertion order.
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn cycle_is_detected() {
        let mut g = Graph::new();
        let t1 = unresolved(&mut g, "t1");
        let t2 = unresolved(&mut g, "t2");
        g.add_node(OpKind::Relu, "a", vec![t2], vec![t1], Default::default())
            .unwrap();
        g.add_node(OpKind::Neg, "b", vec![t1], vec![t2], Default::default())
            .unwrap();
        assert_eq!(g.topological_order().unwrap_err(), IrError::GraphCycleDetected);
    }
}
