use owo_colors::OwoColorize;

pub fn debug(verbose: bool, msg: &str) {
    if verbose {
        eprintln!("{} {msg}", "debug:".dimmed());
    }
}

pub fn warn(msg: &str) {
    eprintln!("{} {msg}", "warning:".yellow().bold());
}

pub fn error(msg: &str) {
    eprintln!("{} {msg}", "error:".red().bold());
}
