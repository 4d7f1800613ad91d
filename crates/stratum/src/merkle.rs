use super::*;

/// The merkle steps of a block template: the sibling hashes on the path from the coinbase
/// leaf to the root, computed once per template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MerkleTree {
    steps: Vec<TxMerkleNode>,
}

impl MerkleTree {
    /// Builds the steps for a template whose non-coinbase transactions are `txids`, in
    /// block order.
    pub fn new(txids: &[Txid]) -> Self {
        let mut level = Vec::with_capacity(txids.len() + 1);
        level.push(TxMerkleNode::all_zeros());
        level.extend(
            txids
                .iter()
                .map(|txid| TxMerkleNode::from_raw_hash(txid.to_raw_hash())),
        );

        let mut steps = Vec::new();

        while level.len() > 1 {
            steps.push(level[1]);

            level = level
                .chunks(2)
                .map(|pair| {
                    let left = pair[0];
                    let right = pair.get(1).copied().unwrap_or(left);
                    Self::combine(left, right)
                })
                .collect();
        }

        Self { steps }
    }

    pub fn steps(&self) -> &[TxMerkleNode] {
        &self.steps
    }

    /// Root of the tree with `first` as the coinbase leaf. With no template transactions the
    /// root is `first` itself.
    pub fn with_first(&self, first: [u8; 32]) -> TxMerkleNode {
        self.steps
            .iter()
            .fold(TxMerkleNode::from_byte_array(first), |acc, step| {
                Self::combine(acc, *step)
            })
    }

    fn combine(left: TxMerkleNode, right: TxMerkleNode) -> TxMerkleNode {
        let mut engine = TxMerkleNode::engine();
        left.consensus_encode(&mut engine)
            .expect("in-memory writers don't error");
        right
            .consensus_encode(&mut engine)
            .expect("in-memory writers don't error");
        TxMerkleNode::from_engine(engine)
    }
}
