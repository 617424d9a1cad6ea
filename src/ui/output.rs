use crate::fact::Fact;
use crate::output::is_quiet;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::DOG, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

/// One fact as a list row: position, short id, text
pub fn fact_line(index: usize, fact: &Fact) {
    let id = fact.id.to_id_string();
    let short = &id[..8];
    println!(
        "{:>3}. {} {}",
        index + 1,
        short.style(theme().dim.clone()),
        fact.text.style(theme().fact.clone())
    );
}

pub fn fact_added(fact: &Fact) {
    println!("{} {}", Icons::NEW.style(theme().success.clone()), fact.text);
}

pub fn fact_removed(fact: &Fact) {
    println!("{} {}", Icons::DEL.style(theme().error.clone()), fact.text.style(theme().dim.clone()));
}

pub fn summary_row(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("  {} {}", label.style(theme().dim.clone()), value);
}
