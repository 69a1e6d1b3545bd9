//! Batch frame vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use modwss_core::protocol::Batch;

mod vector_loader;
use vector_loader::load;

#[test]
fn batch_vectors() {
    let files = [
        "batch_single.json",
        "batch_multi.json",
        "batch_no_context.json",
        "batch_empty.json",
        "batch_not_json.json",
        "batch_messages_not_array.json",
        "batch_mixed_valid_invalid.json",
    ];

    for f in files {
        let v = load(f);
        let res = Batch::decode(&v.frame);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let batch = res.expect("expected ok batch");
        let ex = v.expect.expect("missing expect block");
        let want: Vec<&str> = ex["operations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_str().unwrap())
            .collect();
        let got: Vec<&str> = batch.messages.iter().map(|e| e.operation.as_str()).collect();
        assert_eq!(got, want, "vector={}", v.description);
        let skipped = ex.get("skipped").and_then(|s| s.as_u64()).unwrap_or(0);
        assert_eq!(batch.skipped as u64, skipped, "vector={}", v.description);
    }
}

#[test]
fn encoded_batch_keeps_order_and_context() {
    let frame = load("batch_multi.json").frame;
    let batch = Batch::decode(&frame).unwrap();
    let reencoded = Batch::decode(&batch.encode().unwrap()).unwrap();

    assert_eq!(reencoded.len(), 2);
    assert_eq!(reencoded.messages[0].operation, "failed-operation");
    assert!(reencoded.messages[1].context_json().contains("\"ZZ99Z\""));
}
