//! Dependency gate
//!
//! A transaction may run once every step it names in `depends_on` is
//! completed. Dependencies are resolved against the other entries of the same
//! cart by `(step_group_identifier, step_type)`. A dependency that matches no
//! entry is satisfied: the step was already done on-chain and never queued.

use super::types::{CartTransaction, CartTxStatus, Dependency};

/// Outcome of checking one transaction against the cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Every dependency is completed or absent
    Ready,
    /// At least one dependency is still pending or executing
    Waiting(Vec<Dependency>),
    /// At least one dependency failed; needs retry or removal
    Blocked(Vec<Dependency>),
}

impl Gate {
    pub fn is_ready(&self) -> bool {
        matches!(self, Gate::Ready)
    }
}

/// Check `tx` against the other entries of `cart`
pub fn check(tx: &CartTransaction, cart: &[CartTransaction]) -> Gate {
    let mut waiting = Vec::new();
    let mut blocked = Vec::new();

    for dep in &tx.metadata.depends_on {
        let matches: Vec<&CartTransaction> = cart
            .iter()
            .filter(|other| other.id != tx.id)
            .filter(|other| other.metadata.is_step(&dep.step_group_identifier, dep.step_type))
            .collect();

        if matches.iter().any(|m| m.status == CartTxStatus::Failed) {
            blocked.push(dep.clone());
        } else if matches.iter().any(|m| m.status != CartTxStatus::Completed) {
            waiting.push(dep.clone());
        }
    }

    if !blocked.is_empty() {
        Gate::Blocked(blocked)
    } else if !waiting.is_empty() {
        Gate::Waiting(waiting)
    } else {
        Gate::Ready
    }
}

/// First pending transaction, in queue order, whose dependencies are met
pub fn next_eligible(cart: &[CartTransaction]) -> Option<&CartTransaction> {
    cart.iter()
        .filter(|tx| tx.status == CartTxStatus::Pending)
        .find(|tx| check(tx, cart).is_ready())
}
