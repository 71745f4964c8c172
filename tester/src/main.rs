mod common;
mod csv_export;
mod scenarios;

use common::{print_scenario_table, print_section, print_summary};
use std::env;

fn print_header() {
    println!("═══════════════════════════════════════════════════════════════");
    println!("                    PSI Quantum Simulator");
    println!("═══════════════════════════════════════════════════════════════\n");
}

fn print_usage() {
    println!("Usage: tester [OPTIONS]");
    println!();
    println!("Options:");
    println!("  help   Show this help message");
    println!();
    println!("Runs the six Section 8 concrete scenarios (A-F) end to end against");
    println!("libpsi-core and prints a pass/fail summary table.");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "help" || a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    print_header();
    print_section("Running scenarios A-F");

    let results = scenarios::run_all();
    print_scenario_table(&results);
    print_summary(&results);

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
}
