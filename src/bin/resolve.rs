use roll_tree::{DialogRequest, RollContext, RollEvent, RollTree, RollTreeOptions, Selection};
use std::io::{self, BufRead, Write};

const USAGE: &str = "usage: resolve <contexts.json> <formula> [options.json]";

/// Asks on the terminal which modifiers to toggle and for an extra bonus.
/// Typing `cancel` at either prompt cancels the roll.
fn terminal_dialog(request: DialogRequest<'_>) -> Selection {
    let mut selection = request.defaults;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut ask = |prompt: &str| -> Option<String> {
        print!("{}", prompt);
        io::stdout().flush().ok()?;
        match lines.next() {
            Some(Ok(line)) if line.trim() != "cancel" => Some(line.trim().to_owned()),
            _ => None,
        }
    };

    println!("{}", request.config.title.unwrap_or(request.formula));
    for m in request.candidates {
        println!("  [{}] {} ({})", if m.enabled { 'x' } else { ' ' }, m.name, m.modifier);
    }
    let Some(toggled) = ask("toggle (comma separated names): ") else {
        return Selection::cancelled();
    };
    for name in toggled.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match request.candidates.iter().find(|m| m.name == name) {
            Some(m) => {
                selection.modifiers.insert(m.name.clone(), !m.enabled);
            }
            None => eprintln!("Unknown modifier: {}", name),
        }
    }
    let Some(bonus) = ask("bonus: ") else {
        return Selection::cancelled();
    };
    if !bonus.is_empty() {
        selection.bonus = Some(bonus);
    }
    selection
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (contexts, formula) = match args.as_slice() {
        [contexts, formula, ..] => (contexts, formula),
        _ => return Err(USAGE.into()),
    };
    let mut contexts = RollContext::from_json(&std::fs::read_to_string(contexts)?)?;
    let options = match args.get(2) {
        Some(path) => RollTreeOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => RollTreeOptions::default(),
    };

    let mut tree = RollTree::new(options);
    tree.build_roll(formula, &mut contexts, &mut terminal_dialog, |event| match event {
        RollEvent::Cancelled => println!("cancelled"),
        RollEvent::Built(roll) => {
            if let Some(label) = roll.part.as_ref().and_then(|p| p.part_index.as_deref()) {
                println!("{}:", label);
            }
            println!("{} ({})", roll.result.final_roll, roll.roll_mode);
            println!("{}", roll.result.formula);
        }
    })?;
    Ok(())
}
