use crate::types::RunData;

/// Insert a run, replacing any run with the identical `(line, start, end,
/// flavor)` tuple. Returns true when an existing run was replaced.
pub fn upsert_run(runs: &mut Vec<RunData>, run: RunData) -> bool {
    let before = runs.len();
    runs.retain(|r| r != &run);
    let replaced = runs.len() != before;
    runs.push(run);
    replaced
}

/// Remove every run matching the tuple. Returns true if any was removed.
pub fn remove_run(runs: &mut Vec<RunData>, run: &RunData) -> bool {
    let before = runs.len();
    runs.retain(|r| r != run);
    runs.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_run_replaces() {
        let mut runs = Vec::new();
        let run = RunData::new("3", "08:00", "10:00", "Vanilla");
        assert!(!upsert_run(&mut runs, run.clone()));
        assert!(upsert_run(&mut runs, run.clone()));
        assert_eq!(runs, vec![run]);
    }

    #[test]
    fn test_different_flavor_appends() {
        let mut runs = Vec::new();
        upsert_run(&mut runs, RunData::new("3", "08:00", "10:00", "Vanilla"));
        upsert_run(&mut runs, RunData::new("3", "08:00", "10:00", "Mint"));
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_remove_run() {
        let mut runs = vec![
            RunData::new("1", "06:00", "07:00", "A"),
            RunData::new("2", "06:00", "07:00", "A"),
        ];
        assert!(remove_run(&mut runs, &RunData::new("1", "06:00", "07:00", "A")));
        assert!(!remove_run(&mut runs, &RunData::new("1", "06:00", "07:00", "A")));
        assert_eq!(runs.len(), 1);
    }
}
