//! Properties every subsample must satisfy, checked by re-indexing the
//! files the manager writes.

use genepop_index::manager::{GenepopFileManager, WriteOptions};
use genepop_index::sampling::SampleScheme;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Three populations of 9, 6 and 1 individuals; the second has
/// two-line records.
fn source_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Simulated cohort").unwrap();
    for l in 1..=4 {
        writeln!(file, "locus{}", l).unwrap();
    }
    writeln!(file, "pop").unwrap();
    for i in 1..=9 {
        writeln!(file, "north{}, 0101 0202 0303 0404", i).unwrap();
    }
    writeln!(file, "pop").unwrap();
    for i in 1..=6 {
        writeln!(file, "south{}, 0101 0202", i).unwrap();
        writeln!(file, "0303 0404").unwrap();
    }
    writeln!(file, "pop").unwrap();
    writeln!(file, "island1, 0101 0202 0303 0404").unwrap();
    file.flush().unwrap();
    file
}

/// True if `sub` appears in `full` in the same relative order.
fn is_ordered_subset(sub: &[String], full: &[String]) -> bool {
    let mut rest = full.iter();
    sub.iter().all(|s| rest.any(|f| f == s))
}

// =============================================================================
// Proportional sampling
// =============================================================================

#[test]
fn test_proportion_sizes_and_order() {
    let source = source_file();
    let mut manager = GenepopFileManager::with_seed(source.path(), 2024).unwrap();
    let dir = tempdir().unwrap();

    // (proportion, expected sizes) with half-to-even rounding
    let cases = [
        (0.5, [4, 3, 0]),
        (0.25, [2, 2, 0]),
        (1.0, [9, 6, 1]),
        (0.0, [0, 0, 0]),
    ];

    for (proportion, expected) in cases {
        for replicate in 0..3 {
            let tag = SampleScheme::Proportion.tag(proportion, replicate);
            manager
                .subsample_individuals_by_proportion(proportion, &tag)
                .unwrap();
            let dest = dir.path().join(format!("out_{}", tag));
            manager
                .write(&dest, &WriteOptions::new().with_individuals(tag.as_str()))
                .unwrap();

            let written = GenepopFileManager::with_seed(&dest, 0).unwrap();
            assert_eq!(written.population_count(), 3, "tag {}", tag);
            assert_eq!(written.loci_names().unwrap().len(), 4);
            for p in 1..=3 {
                assert_eq!(written.individual_count(p).unwrap(), expected[p - 1]);
                let kept = written.individual_names(p, None).unwrap();
                let all = manager.individual_names(p, None).unwrap();
                assert!(is_ordered_subset(&kept, &all), "tag {} pop {}", tag, p);
            }
        }
    }
}

#[test]
fn test_multiline_records_stay_whole() {
    let source = source_file();
    let mut manager = GenepopFileManager::with_seed(source.path(), 9).unwrap();
    manager.subsample_populations_by_list(&[2], "south").unwrap();
    manager.subsample_individuals_by_proportion(0.5, "half").unwrap();

    let mut out = Vec::new();
    let options = WriteOptions::new()
        .with_populations("south")
        .with_individuals("half");
    manager.print(&mut out, &options).unwrap();
    let text = String::from_utf8(out).unwrap();

    let body: Vec<&str> = text.lines().skip_while(|l| *l != "pop").skip(1).collect();
    assert_eq!(body.len(), 6);
    for pair in body.chunks(2) {
        assert!(pair[0].starts_with("south"));
        assert_eq!(pair[1], "0303 0404");
    }
}

#[test]
fn test_same_seed_same_files() {
    let source = source_file();
    let dir = tempdir().unwrap();

    let mut outputs = Vec::new();
    for run in 0..2 {
        let mut manager = GenepopFileManager::with_seed(source.path(), 77).unwrap();
        manager.subsample_by_removal(1, "n_1_r_0").unwrap();
        let dest = dir.path().join(format!("run{}", run));
        manager
            .write(&dest, &WriteOptions::new().with_individuals("n_1_r_0"))
            .unwrap();
        outputs.push(std::fs::read(&dest).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

// =============================================================================
// Leave-one-out
// =============================================================================

#[test]
fn test_leave_one_out_covers_every_individual() {
    let source = source_file();
    let mut manager = GenepopFileManager::with_seed(source.path(), 0).unwrap();
    let all = manager.individual_names(1, None).unwrap();

    for n in 1..=all.len() {
        let tag = format!("l_{}", n);
        manager.subsample_leave_nth_out(n, 1, &tag).unwrap();

        assert_eq!(manager.population_numbers(None).unwrap(), vec![1, 2, 3]);
        assert_eq!(manager.individual_counts(Some(tag.as_str()), None).unwrap(), vec![8]);

        let kept = manager.individual_names(1, Some(tag.as_str())).unwrap();
        let mut expected = all.clone();
        expected.remove(n - 1);
        assert_eq!(kept, expected);
    }
}

// =============================================================================
// Minimum population size
// =============================================================================

#[test]
fn test_small_populations_leave_no_delimiter() {
    let source = source_file();
    let mut manager = GenepopFileManager::with_seed(source.path(), 3).unwrap();
    manager.subsample_individuals_by_proportion(0.5, "half").unwrap();

    let mut out = Vec::new();
    let options = WriteOptions::new()
        .with_individuals("half")
        .with_min_population_size(4);
    let stats = manager.print(&mut out, &options).unwrap();
    let text = String::from_utf8(out).unwrap();

    // sizes are 4, 3 and 0; only the first reaches the minimum
    assert_eq!(text.lines().filter(|l| *l == "pop").count(), 1);
    assert_eq!(stats.populations_written, 1);
    assert_eq!(stats.populations_skipped, 2);
    assert!(text.lines().all(|l| !l.starts_with("south")));
    assert_eq!(
        manager.empty_populations(None, Some("half")).unwrap(),
        vec![3]
    );
}
