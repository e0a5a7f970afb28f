//! Property-based tests for the commit-or-abort policy

mod common;

use chunkup_client::*;
use common::*;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn props_any_failing_part_aborts_once_and_never_commits(
        len in 1u64..20_000,
        part_size in 256u64..4096,
        pick in any::<prop::sample::Index>(),
    ) {
        let parts = len.div_ceil(part_size);
        let failing = pick.index(parts as usize) as u32 + 1;

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let file = fixture(len);
            let store = Arc::new(MemoryStore::new());
            store.fail_part(failing, network_error());

            let err = uploader(&store, part_size)
                .upload(file.path(), &destination())
                .await
                .unwrap_err();

            match &err {
                UploadError::PartUpload { part_number, cause: PartError::Store(e) } => {
                    assert_eq!(*part_number, failing);
                    assert_eq!(e, &network_error());
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(store.call_count(StoreOp::UploadPart), failing as usize);
            assert_eq!(aborted_sessions(&store), vec!["mem-upload-1".to_string()]);
            assert_eq!(store.call_count(StoreOp::Complete), 0);
            assert_eq!(store.open_sessions(), 0);
        });
    }

    #[test]
    fn props_full_success_commits_every_part_once(
        len in 1u64..20_000,
        part_size in 256u64..4096,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let file = fixture(len);
            let store = Arc::new(MemoryStore::new());

            let receipt = uploader(&store, part_size)
                .upload(file.path(), &destination())
                .await
                .unwrap();

            let expected: Vec<u32> = (1..=len.div_ceil(part_size) as u32).collect();
            let committed: Vec<Vec<u32>> = store
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    StoreCall::Complete { part_numbers, .. } => Some(part_numbers),
                    _ => None,
                })
                .collect();

            assert_eq!(committed, vec![expected.clone()]);
            assert_eq!(receipt.parts, expected.len());
            assert_eq!(store.call_count(StoreOp::Abort), 0);
            assert_eq!(store.object(&destination()).unwrap().as_ref(), pattern(len).as_slice());
        });
    }
}
