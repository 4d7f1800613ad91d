use super::*;

/// `mining.notify` parameters. Every field after the job id is the hex encoding of the bytes
/// it contributes to the block header, in header order, so a miner can assemble the header
/// by concatenation. The coinbase never carries miner-rolled bytes, which is why the
/// recipient's own merkle root travels at index 3 instead of coinbase parts and a branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Notify {
    pub job_id: JobId,
    pub version: i32,
    pub prevhash: BlockHash,
    pub merkle_root: TxMerkleNode,
    pub reserved: [u8; 32],
    pub ntime: Ntime,
    pub nbits: CompactTarget,
    pub clean_jobs: bool,
}

impl Notify {
    pub const MERKLE_ROOT_INDEX: usize = 3;
}

impl Serialize for Notify {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(8))?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&hex::encode(self.version.to_le_bytes()))?;
        seq.serialize_element(&hex::encode(self.prevhash.to_byte_array()))?;
        seq.serialize_element(&hex::encode(self.merkle_root.to_byte_array()))?;
        seq.serialize_element(&hex::encode(self.reserved))?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&hex::encode(self.nbits.to_consensus().to_le_bytes()))?;
        seq.serialize_element(&self.clean_jobs)?;
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq as pretty_assert_eq, serde_json::json};

    #[test]
    fn serializes_header_fields_in_order() {
        let notify = Notify {
            job_id: JobId::new(0x1f),
            version: 4,
            prevhash: BlockHash::from_byte_array([0x11; 32]),
            merkle_root: TxMerkleNode::from_byte_array([0x22; 32]),
            reserved: [0; 32],
            ntime: Ntime::from(0x5a5b5c5d),
            nbits: CompactTarget::from_consensus(0x1d00ffff),
            clean_jobs: true,
        };

        pretty_assert_eq!(
            serde_json::to_value(&notify).unwrap(),
            json!([
                "1f",
                "04000000",
                "11".repeat(32),
                "22".repeat(32),
                "00".repeat(32),
                "5d5c5b5a",
                "ffff001d",
                true
            ])
        );
    }

    #[test]
    fn merkle_root_index_points_at_merkle_root() {
        let notify = Notify {
            job_id: JobId::new(1),
            version: 1,
            prevhash: BlockHash::all_zeros(),
            merkle_root: TxMerkleNode::from_byte_array([0xee; 32]),
            reserved: [0; 32],
            ntime: Ntime::from(0),
            nbits: CompactTarget::from_consensus(0x207fffff),
            clean_jobs: false,
        };

        let params = serde_json::to_value(&notify).unwrap();
        assert_eq!(params[Notify::MERKLE_ROOT_INDEX], json!("ee".repeat(32)));
    }
}
