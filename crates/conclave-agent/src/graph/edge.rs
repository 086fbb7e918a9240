use serde::{Deserialize, Serialize};

/// A directed hand-off route: `from` may pass control to `to`.
///
/// A two-way conversation needs an edge in each direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The same route in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(&self.to, &self.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_is_directed() {
        let e = Edge::new("supervisor", "writer");
        assert_eq!(e.from, "supervisor");
        assert_ne!(e, e.reversed());
        assert_eq!(e.reversed().reversed(), e);
    }
}
