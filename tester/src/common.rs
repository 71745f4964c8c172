use std::time::{Duration, Instant};

/// Outcome of one Section 8 concrete scenario: whether the observed value
/// landed within the scenario's tolerance of its expected value, how long
/// the run took, and a short human-readable detail string for the table.
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    pub elapsed: Duration,
}

/// Runs `body`, timing it, and wraps the outcome into a [`ScenarioResult`].
/// `body` returns `(passed, detail)` rather than panicking so a failing
/// scenario still shows up in the summary table instead of aborting the
/// whole run.
pub fn run_scenario(name: &str, body: impl FnOnce() -> (bool, String)) -> ScenarioResult {
    let start = Instant::now();
    let (passed, detail) = body();
    ScenarioResult {
        name: name.to_string(),
        passed,
        detail,
        elapsed: start.elapsed(),
    }
}

pub fn format_duration(d: Duration) -> String {
    if d.as_secs() > 0 {
        format!("{:.3}s", d.as_secs_f64())
    } else if d.as_millis() > 0 {
        format!("{:.3}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{:.3}us", d.as_secs_f64() * 1_000_000.0)
    }
}

pub fn print_section(title: &str) {
    let width = 61;
    let padding = width.saturating_sub(title.len() + 2);
    println!("┌{}┐", "─".repeat(width));
    println!("│ {}{} │", title, " ".repeat(padding));
    println!("└{}┘\n", "─".repeat(width));
}

/// Box-drawn results table, same idiom as the teacher's
/// `print_benchmark_table` (`BasicRT` vs `BasicRTMT` comparison) but over
/// scenario pass/fail and detail instead of a two-runtime speedup.
pub fn print_scenario_table(results: &[ScenarioResult]) {
    const C1: usize = 10;
    const C2: usize = 12;
    const C3: usize = 6;
    const C4: usize = 46;

    let top = format!(
        "╔{}═{}═{}═{}╗",
        "═".repeat(C1 + 2),
        "═".repeat(C2 + 2),
        "═".repeat(C3 + 2),
        "═".repeat(C4 + 2)
    );
    let header_sep = format!(
        "╠{}╪{}╪{}╪{}╣",
        "═".repeat(C1 + 2),
        "═".repeat(C2 + 2),
        "═".repeat(C3 + 2),
        "═".repeat(C4 + 2)
    );
    let bottom = format!(
        "╚{}╧{}╧{}╧{}╝",
        "═".repeat(C1 + 2),
        "═".repeat(C2 + 2),
        "═".repeat(C3 + 2),
        "═".repeat(C4 + 2)
    );
    let total_width = C1 + C2 + C3 + C4 + 11;

    println!("\n{}", top);
    println!("║{:^width$}║", "SCENARIO RESULTS", width = total_width);
    println!("{}", header_sep);
    println!(
        "║ {:<C1$} │ {:<C2$} │ {:<C3$} │ {:<C4$} ║",
        "Scenario", "Time", "Result", "Detail"
    );
    println!("{}", header_sep);

    for r in results {
        let status = if r.passed { "PASS" } else { "FAIL" };
        println!(
            "║ {:<C1$} │ {:<C2$} │ {:<C3$} │ {:<C4$} ║",
            r.name,
            format_duration(r.elapsed),
            status,
            truncate(&r.detail, C4),
        );
    }
    println!("{}", bottom);
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max.saturating_sub(1)])
    }
}

pub fn print_summary(results: &[ScenarioResult]) {
    let all_pass = results.iter().all(|r| r.passed);
    println!();
    if all_pass {
        println!("✓ All scenarios matched their expected values.");
    } else {
        println!("✗ WARNING: one or more scenarios did not match their expected values!");
    }
    let total: Duration = results.iter().map(|r| r.elapsed).sum();
    println!("\nTotal scenario time: {}", format_duration(total));
}
