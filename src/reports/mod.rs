use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use otalign::batch::{Classification, PairOutcome};
use otalign::optimizer::Solution;
use otalign::transport::Mapping;

const PARAM_NAMES: [&str; 5] = ["shift x", "shift y", "rotation", "scale x", "scale y"];

pub fn print_alignment(reference: &str, candidate: &str, solution: &Solution, mapping: &Mapping) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Field").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Reference"), Cell::new(reference)]);
    table.add_row(vec![Cell::new("Candidate"), Cell::new(candidate)]);
    table.add_row(vec![
        Cell::new("Fitness"),
        Cell::new(format!("{:.6}", solution.fitness)).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("Transport cost"),
        Cell::new(format!("{:.6}", mapping.total_cost())),
    ]);
    table.add_row(vec![
        Cell::new("Iterations"),
        Cell::new(solution.iterations_used.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Termination"),
        Cell::new(solution.termination.to_string()),
    ]);

    for (name, value) in PARAM_NAMES.iter().zip(solution.location.components()) {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{:.5}", value)).fg(Color::Green),
        ]);
    }

    let stats = mapping.stats();
    table.add_row(vec![
        Cell::new("Solver phases"),
        Cell::new(format!(
            "{} ({} augmentations)",
            stats.phases, stats.augmentations
        )),
    ]);

    if let Some(col) = table.column_mut(1) {
        col.set_cell_alignment(CellAlignment::Right);
    }
    println!("\n{}", table);
}

pub fn print_pair_outcomes(outcomes: &[PairOutcome]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Candidate").add_attribute(Attribute::Bold),
        Cell::new("Reference").add_attribute(Attribute::Bold),
        Cell::new("Fitness").fg(Color::Cyan),
        Cell::new("Iters"),
        Cell::new("Stop"),
    ]);

    for o in outcomes {
        match &o.result {
            Ok(sol) => table.add_row(vec![
                Cell::new(&o.candidate_id),
                Cell::new(&o.reference_id),
                Cell::new(format!("{:.6}", sol.fitness)).fg(Color::Cyan),
                Cell::new(sol.iterations_used.to_string()),
                Cell::new(sol.termination.to_string()),
            ]),
            Err(e) => table.add_row(vec![
                Cell::new(&o.candidate_id),
                Cell::new(&o.reference_id),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(e.to_string()).fg(Color::Red),
            ]),
        };
    }

    for i in 2..=3 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
    println!("\n{}", table);
}

pub fn print_classification(results: &[Classification]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Candidate").add_attribute(Attribute::Bold),
        Cell::new("Best Match").fg(Color::Green),
        Cell::new("Fitness"),
    ]);

    for c in results {
        let label = c.reference_id.as_deref().unwrap_or("(none)");
        let fitness = if c.fitness.is_finite() {
            format!("{:.6}", c.fitness)
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            Cell::new(&c.candidate_id).add_attribute(Attribute::Bold),
            Cell::new(label).fg(Color::Green),
            Cell::new(fitness),
        ]);
    }
    println!("\n{}", table);
}
