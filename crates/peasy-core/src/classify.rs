//! Model classification and initial-state extraction

use crate::{Model, Node, Path, Value, ValueMap};

/// The role a model node plays in the compiled store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Plain state (lists and data maps included)
    Data,
    /// State transition
    Mutator,
    /// Asynchronous side effect
    Effect,
    /// Nested namespace, walked recursively
    Namespace,
}

impl Kind {
    /// Mutators and effects become actions
    pub fn is_action(self) -> bool {
        matches!(self, Kind::Mutator | Kind::Effect)
    }
}

/// Classify a single node
pub fn classify(node: &Node) -> Kind {
    match node {
        Node::Data(_) => Kind::Data,
        Node::Mutator(_) => Kind::Mutator,
        Node::Effect(_) => Kind::Effect,
        Node::Namespace(_) => Kind::Namespace,
    }
}

/// Walk the whole tree once, yielding every node's path and kind in
/// declaration order (parents before children).
pub fn classify_tree(model: &Model) -> Vec<(Path, Kind)> {
    let mut out = Vec::new();
    walk(model, &Path::root(), &mut out);
    out
}

fn walk(model: &Model, path: &Path, out: &mut Vec<(Path, Kind)>) {
    for (key, node) in model.iter() {
        let child = path.child(key.as_str());
        out.push((child.clone(), classify(node)));
        if let Node::Namespace(inner) = node {
            walk(inner, &child, out);
        }
    }
}

/// Whether any mutator or effect exists anywhere below `model`
pub fn has_actions(model: &Model) -> bool {
    model.iter().any(|(_, node)| match node {
        Node::Mutator(_) | Node::Effect(_) => true,
        Node::Namespace(inner) => has_actions(inner),
        Node::Data(_) => false,
    })
}

/// Whether any mutator exists anywhere below `model`
pub fn has_mutators(model: &Model) -> bool {
    model.iter().any(|(_, node)| match node {
        Node::Mutator(_) => true,
        Node::Namespace(inner) => has_mutators(inner),
        Node::Data(_) | Node::Effect(_) => false,
    })
}

/// The pure-data projection of the model: data nodes kept, namespaces
/// recursed (even when they hold no actions), mutators and effects dropped.
pub fn initial_state(model: &Model) -> Value {
    let mut map = ValueMap::new();
    for (key, node) in model.iter() {
        match node {
            Node::Data(value) => {
                map.insert(key.clone(), value.clone());
            }
            Node::Namespace(inner) => {
                map.insert(key.clone(), initial_state(inner));
            }
            Node::Mutator(_) | Node::Effect(_) => {}
        }
    }
    Value::from(map)
}
