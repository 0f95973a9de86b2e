use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Splits comma-separated values and drops empty entries.
pub fn split_targets<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads one target per non-empty line. `-` reads standard input.
pub fn read_target_lines(path: &Path) -> io::Result<Vec<String>> {
    if path.as_os_str() == "-" {
        return collect_lines(io::stdin().lock());
    }
    collect_lines(BufReader::new(File::open(path)?))
}

fn collect_lines<R: BufRead>(reader: R) -> io::Result<Vec<String>> {
    let mut targets = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            targets.push(line.to_string());
        }
    }
    Ok(targets)
}
