use hive_crypto::{sign, verify, CodecError, Keypair};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arbitrary_payload() -> impl Strategy<Value = Value> {
    ("[a-z0-9-]{1,24}", any::<u64>(), "[a-zA-Z0-9 ]{0,40}", any::<bool>()).prop_map(
        |(task_id, round, note, flag)| {
            json!({
                "taskId": task_id,
                "roundNumber": round,
                "note": note,
                "flag": flag,
                "nested": { "b": [1, 2, 3], "a": round % 7 },
            })
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: verifying a fresh signature recovers a payload deep-equal to the input
    #[test]
    fn prop_sign_verify_recovers_payload(seed in any::<[u8; 32]>(), payload in arbitrary_payload()) {
        let keypair = Keypair::from_bytes(&seed).unwrap();
        let encoded = sign(&keypair, &payload).unwrap();

        let recovered = verify(&encoded, keypair.public_key()).unwrap();
        let decoded: Value = serde_json::from_slice(&recovered).unwrap();
        prop_assert_eq!(decoded, payload);
    }

    /// Property: a signature never verifies against a different key
    #[test]
    fn prop_other_key_rejected(
        seed in any::<[u8; 32]>(),
        other_seed in any::<[u8; 32]>(),
        payload in arbitrary_payload(),
    ) {
        prop_assume!(seed != other_seed);
        let signer = Keypair::from_bytes(&seed).unwrap();
        let other = Keypair::from_bytes(&other_seed).unwrap();
        let encoded = sign(&signer, &payload).unwrap();

        let result = verify(&encoded, other.public_key());
        prop_assert!(matches!(result, Err(CodecError::InvalidSignature)));
    }
}
