use console::Style;

use crate::state::RunSummary;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

pub fn print_run_summary(summary: &RunSummary) {
    let score_pct = summary.score * 100.0;
    let seconds = summary.duration_ms as f64 / 1000.0;

    if summary.escaped == 0 {
        let style = Style::new().green().bold();
        println!(
            "{} {} mutants, none escaped ({:.1}% detected) in {:.1}s",
            style.apply_to("✓"),
            summary.total,
            score_pct,
            seconds,
        );
    } else {
        let style = Style::new().yellow().bold();
        println!(
            "{} {} escaped / {} mutants ({:.1}% detected) in {:.1}s",
            style.apply_to("!"),
            summary.escaped,
            summary.total,
            score_pct,
            seconds,
        );
    }

    let dim = Style::new().dim();
    for (count, label) in [
        (summary.timed_out, "timed out"),
        (summary.errored, "errored"),
        (summary.skipped, "skipped (no covering tests)"),
    ] {
        if count > 0 {
            println!("  {} {} {}", dim.apply_to("·"), count, label);
        }
    }

    if summary.escaped_mutants.is_empty() {
        return;
    }
    println!();
    for m in &summary.escaped_mutants {
        let ref_style = Style::new().cyan().bold();
        let op_style = Style::new().magenta();
        println!(
            "  {} {}:{} {} {} → {}",
            ref_style.apply_to(format!("@{}", m.ref_id)),
            m.file,
            m.line,
            dim.apply_to(format!("[{}]", m.mutator)),
            op_style.apply_to(&m.original),
            op_style.apply_to(&m.replacement),
        );
    }
}

pub fn print_status(summary: &RunSummary) {
    println!(
        "Last run: {} mutants, {} killed, {} escaped ({:.1}% score)",
        summary.total,
        summary.killed,
        summary.escaped,
        summary.score * 100.0,
    );
}
