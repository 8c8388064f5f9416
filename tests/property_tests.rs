use std::fs;
use std::path::PathBuf;

use level6::RunContext;
use level6::compare::{multiway, pairwise};
use proptest::prelude::*;
use tempfile::TempDir;

fn normalized(mut sets: Vec<Vec<PathBuf>>) -> Vec<Vec<PathBuf>> {
    for set in sets.iter_mut() {
        set.sort();
    }
    sets.sort();
    sets
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_strategies_agree(contents in prop::collection::vec(0u8..4, 2..12)) {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = contents
            .iter()
            .enumerate()
            .map(|(i, &variant)| {
                let path = dir.path().join(format!("f{i:02}"));
                // same length for every file, differing only near the end
                let mut bytes = vec![b'x'; 5000];
                bytes[4500] = variant;
                fs::write(&path, &bytes).unwrap();
                path
            })
            .collect();

        let ctx = RunContext::new();
        let by_rounds = normalized(multiway(&paths, &ctx));
        let by_pairs = normalized(pairwise(&paths, &ctx));
        prop_assert_eq!(&by_rounds, &by_pairs);

        // every set holds one content variant and every variant seen twice or more has a set
        let mut expected: Vec<Vec<PathBuf>> = (0u8..4)
            .map(|variant| {
                contents
                    .iter()
                    .zip(&paths)
                    .filter(|(v, _)| **v == variant)
                    .map(|(_, p)| p.clone())
                    .collect::<Vec<_>>()
            })
            .filter(|set| set.len() > 1)
            .collect();
        expected.sort();
        prop_assert_eq!(by_rounds, expected);
        prop_assert!(!ctx.has_error());
    }
}
