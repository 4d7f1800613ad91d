use super::*;

/// A coinbase split around the extranonce1 slot.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinbaseParts {
    pub transaction: Transaction,
    pub coinb1: Vec<u8>,
    pub coinb2: Vec<u8>,
}

/// Builds the generation transaction for a template. The script sig reserves a
/// fixed-size slot for the miner's extranonce1; everything before and after it is
/// serialized once per job.
#[derive(Clone)]
pub struct CoinbaseBuilder {
    aux: BTreeMap<String, String>,
    height: u64,
    pool_script: ScriptBuf,
    pool_sig: Option<String>,
    value: Amount,
    witness_commitment: Option<ScriptBuf>,
}

impl CoinbaseBuilder {
    const MAX_COINBASE_SCRIPT_SIG_SIZE: usize = 100;

    pub fn new(pool_script: ScriptBuf, height: u64, value: Amount) -> Self {
        Self {
            aux: BTreeMap::new(),
            height,
            pool_script,
            pool_sig: None,
            value,
            witness_commitment: None,
        }
    }

    pub fn with_aux(mut self, aux: BTreeMap<String, String>) -> Self {
        self.aux = aux;
        self
    }

    pub fn with_pool_sig(mut self, pool_sig: String) -> Self {
        self.pool_sig = Some(pool_sig);
        self
    }

    pub fn with_witness_commitment(mut self, witness_commitment: Option<ScriptBuf>) -> Self {
        self.witness_commitment = witness_commitment;
        self
    }

    pub fn build(self) -> Result<CoinbaseParts> {
        let mut buf: Vec<u8> = Vec::with_capacity(Self::MAX_COINBASE_SCRIPT_SIG_SIZE);

        // BIP34 height
        let mut height = [0u8; 8];
        let len = write_scriptint(
            &mut height,
            self.height
                .try_into()
                .context("block height does not fit a script number")?,
        );
        buf.push(len as u8);
        buf.extend_from_slice(&height[..len]);

        for (name, value) in self.aux {
            buf.extend_from_slice(
                &hex::decode(&value)
                    .with_context(|| format!("invalid coinbaseaux `{name}` value `{value}`"))?,
            );
        }

        let script_prefix_size = buf.len();

        buf.extend_from_slice(&[0u8; ENONCE1_SIZE]);

        if let Some(sig) = self.pool_sig {
            buf.extend_from_slice(sig.as_bytes());
        }

        let script_sig = ScriptBuf::from_bytes(buf);
        let script_sig_size = script_sig.len();

        ensure!(
            script_sig_size <= Self::MAX_COINBASE_SCRIPT_SIG_SIZE,
            "Script sig too large is {script_sig_size} bytes (max {})",
            Self::MAX_COINBASE_SCRIPT_SIG_SIZE
        );

        let mut output = vec![TxOut {
            value: self.value,
            script_pubkey: self.pool_script,
        }];

        if let Some(script_pubkey) = self.witness_commitment {
            output.push(TxOut {
                value: Amount::ZERO,
                script_pubkey,
            });
        }

        let transaction = Transaction {
            version: bitcoin::transaction::Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig,
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output,
        };

        // version, input count, null outpoint, script length, script prefix
        let offset = 4
            + VarInt(transaction.input.len() as u64).size()
            + 36
            + VarInt(script_sig_size as u64).size()
            + script_prefix_size;

        let bin = consensus::serialize(&transaction);

        Ok(CoinbaseParts {
            coinb1: bin[..offset].to_vec(),
            coinb2: bin[offset + ENONCE1_SIZE..].to_vec(),
            transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq as pretty_assert_eq};

    fn script() -> ScriptBuf {
        ScriptBuf::new_p2pkh(&bitcoin::PubkeyHash::from_byte_array([7; 20]))
    }

    fn builder() -> CoinbaseBuilder {
        CoinbaseBuilder::new(script(), 500_000, Amount::from_sat(50 * 100_000_000))
    }

    fn join(parts: &CoinbaseParts, extranonce1: &[u8]) -> Vec<u8> {
        let mut full = parts.coinb1.clone();
        full.extend_from_slice(extranonce1);
        full.extend_from_slice(&parts.coinb2);
        full
    }

    #[test]
    fn exceed_script_size_limit() {
        let err = builder()
            .with_pool_sig("aa".repeat(100))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("Script sig too large"));
    }

    #[test]
    fn split_reassembles_with_zero_extranonce1() {
        let parts = builder().with_pool_sig("/shaft/".into()).build().unwrap();

        pretty_assert_eq!(
            join(&parts, &[0; ENONCE1_SIZE]),
            consensus::serialize(&parts.transaction)
        );
    }

    #[test]
    fn extranonce1_lands_in_script_sig() {
        let parts = builder().build().unwrap();
        let full = join(&parts, &[0xab, 0xcd, 0x12, 0x34]);

        let tx = consensus::deserialize::<Transaction>(&full).unwrap();
        let script_sig = tx.input[0].script_sig.as_bytes();

        assert!(
            script_sig
                .windows(ENONCE1_SIZE)
                .any(|window| window == [0xab, 0xcd, 0x12, 0x34])
        );
        assert_eq!(tx.output, parts.transaction.output);
    }

    #[test]
    fn height_is_bip34_encoded() {
        let parts = builder().build().unwrap();
        let script_sig = parts.transaction.input[0].script_sig.as_bytes();

        assert_eq!(&script_sig[..4], &[0x03, 0x20, 0xa1, 0x07]);
    }

    #[test]
    fn aux_flags_precede_extranonce1() {
        let mut aux = BTreeMap::new();
        aux.insert("flags".to_string(), "062f503253482f".to_string());

        let parts = builder().with_aux(aux).build().unwrap();

        assert!(parts.coinb1.ends_with(&hex::decode("062f503253482f").unwrap()));
    }

    #[test]
    fn aux_invalid_hex_errors() {
        let mut aux = BTreeMap::new();
        aux.insert("bad".to_string(), "zz".to_string());

        let err = builder().with_aux(aux).build().unwrap_err();

        assert!(err.to_string().contains("invalid coinbaseaux `bad`"));
    }

    #[test]
    fn outputs_pay_pool_then_witness_commitment() {
        let commitment = ScriptBuf::from_bytes(vec![0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed]);

        let parts = builder()
            .with_witness_commitment(Some(commitment.clone()))
            .build()
            .unwrap();

        assert_eq!(parts.transaction.output.len(), 2);
        assert_eq!(parts.transaction.output[0].script_pubkey, script());
        assert_eq!(
            parts.transaction.output[0].value,
            Amount::from_sat(5_000_000_000)
        );
        assert_eq!(parts.transaction.output[1].script_pubkey, commitment);
        assert_eq!(parts.transaction.output[1].value, Amount::ZERO);

        let parts = builder().build().unwrap();
        assert_eq!(parts.transaction.output.len(), 1);
    }

    #[test]
    fn pool_sig_follows_extranonce1() {
        let parts = builder().with_pool_sig("/shaft/".into()).build().unwrap();

        assert!(parts.coinb2.starts_with(b"/shaft/"));
    }
}
