use clap::CommandFactory;

pub fn display_error(message: &str) {
    eprintln!("\x1b[31mERROR:\x1b[0m {}", message); // Red color
}

pub fn display_success(message: &str) {
    println!("\x1b[32m✓\x1b[0m {}", message); // Green color
}

pub fn display_status(message: &str) {
    println!("\x1b[33m→\x1b[0m {}", message); // Yellow color
}

/// Usage text for a clap command, with the list of targets.
pub fn usage<C: CommandFactory>() -> String {
    C::command().render_help().to_string()
}
