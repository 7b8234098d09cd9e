use log::{debug, error, trace, warn};

use crate::{
    parse::{parse_command, split, split_pipe, ParseError},
    process_exec::{run_pipe, run_single, LaunchPlan},
};

/// Status given to a unit that could not be parsed or spawned.
const FAILURE: i32 = 1;

/// What a single `&&` unit turns into.
#[derive(Debug)]
enum Unit {
    Single(LaunchPlan),
    Pipe(LaunchPlan, LaunchPlan),
}

fn plan(text: &str) -> Result<LaunchPlan, ParseError> {
    LaunchPlan::new(&parse_command(text)?)
}

impl Unit {
    fn parse(text: &str) -> Result<Self, ParseError> {
        match split_pipe(text) {
            Some((left, right)) => Ok(Self::Pipe(plan(left)?, plan(right)?)),
            None => Ok(Self::Single(plan(text)?)),
        }
    }
}

// Main execution entry point; returns the status of the last unit run
pub fn exec(line: &str) -> i32 {
    let mut status = 0;

    // Step 1: `;` groups always run, whatever came before
    for group in split(line, ";") {
        // Step 2: a group is an `&&` chain
        let chain = split(&group, "&&");
        trace!("group {group:?} -> {chain:?}");
        let can_short_circuit = chain.len() > 1;

        for unit in &chain {
            if unit.is_empty() {
                continue;
            }
            status = run(unit);
            if status != 0 && can_short_circuit {
                debug!("{unit:?} failed with {status}, skipping rest of chain");
                break;
            }
        }
    }

    status
}

// Dispatch one unit to the pipe or single runner
pub fn run(text: &str) -> i32 {
    let unit = match Unit::parse(text) {
        Ok(unit) => unit,
        Err(e) => {
            warn!("{text:?}: {e}");
            eprintln!("forksh: {e}");
            return FAILURE;
        }
    };

    debug!("dispatching {unit:?}");
    let result = match &unit {
        Unit::Single(plan) => run_single(plan),
        Unit::Pipe(left, right) => run_pipe(left, right),
    };

    result.unwrap_or_else(|e| {
        error!("{text:?}: {e}");
        eprintln!("forksh: {e}");
        FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cases that fork live in tests/integration.rs

    #[test]
    fn delimiter_only_lines_dispatch_nothing() {
        assert_eq!(exec(";;"), 0);
        assert_eq!(exec(" && ; && "), 0);
    }

    #[test]
    fn parse_failure_is_status_one() {
        assert_eq!(run("echo hi >"), FAILURE);
        assert_eq!(run("echo hi | cat 2>"), FAILURE);
    }
}
